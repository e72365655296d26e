//! Publishing to the remote object store.

pub mod layout;
pub mod overlay;
pub mod replace;
pub mod store;

pub use layout::RemoteLayout;
pub use overlay::OVERLAY_CONTENT_TYPE;
pub use replace::{
    content_type_for, NoopObserver, PublishError, Publisher, ReplaceObserver, ReplaceReport,
    MAX_DELETE_BATCH,
};
pub use store::{create_remote_store, ObjectStoreRemote, RemoteStore, RemoteStoreError};
