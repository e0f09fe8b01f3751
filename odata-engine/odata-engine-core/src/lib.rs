#![forbid(unsafe_code)]

pub mod domain_error;
pub mod paging;
pub mod provider;
pub mod repository;
pub mod residual;
pub mod resolver;
pub mod update;
pub mod visitor;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use domain_error::{DomainError, DomainErrorKind, DomainResult, ServiceFault};
pub use provider::{QueryProvider, QueryResult, RequestContext};
pub use repository::{ArcRepository, Repository, RepositoryBehavior, RepositoryResolver};
pub use update::{ChangeKind, UpdateContext};

/// Engine configuration, usually loaded by the host at startup.
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    /// How continuation tokens reach the repositories
    pub paging: PagingStrategy,
    /// Page size for entities without an explicit page size.
    /// Without a default, only entities listed in `page_sizes` are paged.
    pub default_page_size: Option<usize>,
    /// Page size per entity name
    pub page_sizes: IndexMap<String, usize>,
}

#[derive(Clone, Copy, Eq, PartialEq, Default, Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum PagingStrategy {
    /// The continuation token is passed opaquely to the repository
    #[default]
    Token,
    /// The continuation token is a `skip:top` pair applied to the operation
    Offset,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paging: PagingStrategy::default(),
            default_page_size: None,
            page_sizes: IndexMap::new(),
        }
    }
}
