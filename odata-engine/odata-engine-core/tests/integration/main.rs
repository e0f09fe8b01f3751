use std::sync::Arc;

use odata_engine_core::{ArcRepository, Config, QueryProvider, repository::ResolverFn};
use odata_engine_test_utils::{init_test_tracing, mock::mock_schema};

mod test_paging;
mod test_resolver;
mod test_update;
mod test_visitor;

/// A provider resolving every entity type to the same repository
fn provider_with(repository: ArcRepository) -> QueryProvider {
    provider_with_config(repository, Config::default())
}

fn provider_with_config(repository: ArcRepository, config: Config) -> QueryProvider {
    init_test_tracing();
    QueryProvider::builder(
        mock_schema(),
        Arc::new(ResolverFn(move |_: &str| Some(repository.clone()))),
    )
    .config(config)
    .build()
}
