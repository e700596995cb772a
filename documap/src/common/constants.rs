// doc constants
pub const DOC_ID: &str = "_id";
pub const TYPE_NAME: &str = "_type";
pub const DOC_UPDATED_AT: &str = "_updated_at";
pub const RESERVED_FIELDS: [&str; 3] = [DOC_ID, TYPE_NAME, DOC_UPDATED_AT];

// modifier operator constants
pub const OP_SET: &str = "$set";
pub const OP_UNSET: &str = "$unset";
pub const OP_PUSH: &str = "$push";
pub const OP_PUSH_ALL: &str = "$pushAll";
pub const OP_PULL: &str = "$pull";
pub const OP_INC: &str = "$inc";
pub const OP_ADD_TO_SET: &str = "$addToSet";

// path constants
pub const FIELD_SEPARATOR: &str = ".";

pub const DOCUMAP_VERSION: &str = env!("CARGO_PKG_VERSION");
