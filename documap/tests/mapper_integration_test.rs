use documap::collection::{Collection, MemoryCollection, MemorySource};
use documap::common::Value;
use documap::context::OperationContext;
use documap::doc;
use documap::eager::EagerLoadBatch;
use documap::errors::DocumapResult;
use documap::persistence::Persister;
use documap::relations::{
    AssociationMetadata, MappedDocument, RelationAccessor, TypeRegistry,
};
use documap::tree::DocumentTree;

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn full_save_cycle_round_trips_through_the_collection() -> DocumapResult<()> {
    let collection = MemoryCollection::new("people");
    collection.insert(doc! {
        "_id": 1,
        "name": "Alice",
        "addresses": [
            { "_id": 11, "street": "Oxford St" },
            { "_id": 12, "street": "King St" }
        ]
    });

    let mut tree = DocumentTree::hydrated(doc! { "_id": 1, "name": "Alice" });
    let root = tree.root();
    let first = tree.hydrated_embeds_many(root, "addresses", 0, doc! { "_id": 11 })?;
    let second = tree.hydrated_embeds_many(root, "addresses", 1, doc! { "_id": 12 })?;

    tree.set_attribute(root, "name", "Bob")?;
    tree.set_attribute(first, "street", "Baker St")?;
    tree.remove_node(second)?;

    let result = Persister::new(&mut tree, &collection).save(&OperationContext::new())?;
    assert_eq!(result.matched(), 1);

    let stored = collection.find(&doc! { "_id": 1 })?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get("name"), Some(&Value::from("Bob")));
    assert_eq!(
        stored[0].get_path("addresses.0.street"),
        Some(&Value::from("Baker St"))
    );
    let addresses = stored[0].get("addresses").unwrap().as_array().unwrap();
    assert_eq!(addresses.len(), 1);
    assert!(stored[0].get("_updated_at").is_some());
    Ok(())
}

#[test]
fn conflicting_changes_resolve_across_two_ordered_updates() -> DocumapResult<()> {
    let collection = MemoryCollection::new("people");
    collection.insert(doc! {
        "_id": 1,
        "addresses": [{ "_id": 11, "street": "Oxford St" }]
    });

    let mut tree = DocumentTree::hydrated(doc! { "_id": 1 });
    let root = tree.root();
    let existing = tree.hydrated_embeds_many(root, "addresses", 0, doc! { "_id": 11 })?;
    tree.set_attribute(existing, "street", "Baker St")?;
    tree.add_embeds_many(root, "addresses", doc! { "street": "New St" })?;

    Persister::new(&mut tree, &collection).save(&OperationContext::new().timeless())?;

    // the push targeting a $set-claimed prefix is deferred to a second update
    assert_eq!(collection.update_count(), 2);
    let stored = collection.find(&doc! { "_id": 1 })?;
    let addresses = stored[0].get("addresses").unwrap().as_array().unwrap();
    assert_eq!(addresses.len(), 2);
    assert_eq!(
        stored[0].get_path("addresses.0.street"),
        Some(&Value::from("Baker St"))
    );
    assert_eq!(
        stored[0].get_path("addresses.1.street"),
        Some(&Value::from("New St"))
    );
    Ok(())
}

#[test]
fn saved_documents_eagerly_load_their_relations() -> DocumapResult<()> {
    let mut source = MemorySource::new();
    let people = source.add("people");
    people.insert(doc! { "_id": 1, "name": "Alice", "game_id": 10 });
    people.insert(doc! { "_id": 2, "name": "Bob", "game_id": 20 });
    let games = source.add("games");
    games.insert(doc! { "_id": 10, "title": "chess" });
    games.insert(doc! { "_id": 20, "title": "go" });
    let posts = source.add("posts");
    posts.insert(doc! { "_id": 100, "person_id": 1, "title": "hello" });
    posts.insert(doc! { "_id": 101, "person_id": 1, "title": "again" });

    let mut batch: Vec<MappedDocument> = people
        .find(&doc! {})?
        .into_iter()
        .map(MappedDocument::new)
        .collect();

    let mut loader = EagerLoadBatch::new(&source, &mut batch);
    loader
        .add(AssociationMetadata::belongs_to("game", "games", "game_id"))
        .add(AssociationMetadata::has_many("posts", "posts", "person_id"));
    loader.run()?;

    // one bulk query per association, regardless of batch size
    assert_eq!(games.query_count(), 1);
    assert_eq!(posts.query_count(), 1);

    let game = batch[0].relation("game").unwrap().as_one().unwrap();
    assert_eq!(game.get("title"), Some(&Value::from("chess")));
    let loaded = batch[0].relation("posts").unwrap().as_many().unwrap();
    assert_eq!(loaded.len(), 2);
    let loaded = batch[1].relation("posts").unwrap().as_many().unwrap();
    assert!(loaded.is_empty());
    Ok(())
}

#[test]
fn fetched_documents_hydrate_through_the_type_registry() -> DocumapResult<()> {
    let collection = MemoryCollection::new("shapes");
    collection.insert(doc! { "_id": 1, "_type": "circle", "radius": 3 });
    collection.insert(doc! { "_id": 2, "_type": "square", "side": 4 });

    let registry = TypeRegistry::new();
    registry.register("circle", |doc| Ok(MappedDocument::new(doc)));
    registry.register("square", |doc| Ok(MappedDocument::new(doc)));

    let fetched = collection.find(&doc! {})?;
    let mut hydrated = Vec::new();
    for doc in fetched {
        hydrated.push(registry.hydrate(doc)?);
    }
    assert_eq!(hydrated.len(), 2);
    assert_eq!(hydrated[0].primary_key(), Value::I64(1));
    Ok(())
}
