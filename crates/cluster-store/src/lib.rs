//! Cluster Object Store
//!
//! A narrow, async view of the Kubernetes API covering exactly what the
//! auto-service controller touches: reading and updating Pods, and creating,
//! reading and deleting their companion Services.
//!
//! # Example
//!
//! ```no_run
//! use cluster_store::{ClusterStore, KubeStore, ObjectKey};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let store = KubeStore::new(client);
//!
//! let pod = store.get_pod(&ObjectKey::new("default", "web-0")).await?;
//! println!("{:?}", pod.metadata.labels);
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Every operation reports failures as [`StoreError`]. The two conditions the
//! controller treats as expected outcomes, [`StoreError::NotFound`] and
//! [`StoreError::AlreadyExists`], are distinguishable from everything else.

pub mod client;
pub mod error;
pub mod key;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeStore;
pub use error::StoreError;
pub use key::ObjectKey;
pub use store_trait::ClusterStore;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockClusterStore, StoreOp};
