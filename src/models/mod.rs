mod prompt;
mod run;
mod setting;
mod share_link;
mod smart_view;
mod space;

pub use prompt::*;
pub use run::*;
use serde::{Serialize, de::DeserializeOwned};
pub use setting::*;
pub use share_link::*;
pub use smart_view::*;
pub use space::*;

use crate::store::Collection;

/// A typed record stored in one of the local store's collections.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;
}

/// Fresh opaque record id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
