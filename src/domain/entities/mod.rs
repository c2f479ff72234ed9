mod document;
mod ref_sub_document;
mod root_document;
mod sub_document;

pub use document::{Document, VersionMap, ROOT_VERSION_KEY};
pub use ref_sub_document::RefSubDocument;
pub use root_document::{RootChange, RootDocument};
pub use sub_document::{SubDocument, NO_EXPIRY};
