//! Server-driven paging through public continuation tokens.
//!
//! The public token is the base64 encoding of `{EntityName}:{page}`. Each page is
//! translated into an offset token `{skip}:{top}` executed in offset paging mode.

use base64::{Engine, engine::general_purpose::STANDARD};
use indexmap::IndexMap;
use odata_runtime::{query::expression::QueryExpr, simple_type_name};
use tracing::debug;

use crate::{
    Config,
    domain_error::{DomainErrorKind, DomainResult},
    provider::{QueryProvider, QueryResult, RequestContext},
};

/// Page size name matching every entity
pub const ANY_ENTITY: &str = "*";

/// Parse an offset token of the form `skip:top`
pub fn parse_offset_token(token: &str) -> DomainResult<(usize, usize)> {
    let invalid = || DomainErrorKind::InvalidContinuationToken.into_error();

    let (skip, top) = token.split_once(':').ok_or_else(invalid)?;
    let skip = skip.trim().parse().map_err(|_| invalid())?;
    let top = top.trim().parse().map_err(|_| invalid())?;

    Ok((skip, top))
}

pub fn offset_token(skip: usize, top: usize) -> String {
    format!("{skip}:{top}")
}

/// Page sizes per entity name
#[derive(Clone, Default, Debug)]
pub struct PageSizes {
    sizes: IndexMap<String, usize>,
}

impl PageSizes {
    pub fn from_config(config: &Config) -> Self {
        let mut sizes = config.page_sizes.clone();
        if let Some(default_page_size) = config.default_page_size {
            sizes
                .entry(ANY_ENTITY.to_string())
                .or_insert(default_page_size);
        }
        Self { sizes }
    }

    pub fn page_size(&self, entity_name: &str) -> Option<usize> {
        self.sizes
            .get(entity_name)
            .or_else(|| self.sizes.get(ANY_ENTITY))
            .copied()
            .filter(|size| *size > 0)
    }
}

/// The page requested by one request
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PageState {
    pub entity_name: String,
    /// One-based page number
    pub page: usize,
    pub page_size: usize,
    /// The `$skip` of the request, applied before paging
    pub current_offset: usize,
}

impl PageState {
    /// The number of elements preceding the page.
    ///
    /// The page number comes from the client, overflow is an invalid token.
    pub fn skip(&self) -> DomainResult<usize> {
        self.page
            .checked_sub(1)
            .and_then(|preceding| preceding.checked_mul(self.page_size))
            .and_then(|skip| skip.checked_add(self.current_offset))
            .ok_or_else(|| DomainErrorKind::InvalidContinuationToken.into_error())
    }

    /// The number of elements up to and including the page
    pub fn end(&self) -> DomainResult<usize> {
        self.skip()?
            .checked_add(self.page_size)
            .ok_or_else(|| DomainErrorKind::InvalidContinuationToken.into_error())
    }

    /// The offset token for the provider
    pub fn offset_token(&self) -> DomainResult<String> {
        Ok(offset_token(self.skip()?, self.page_size))
    }
}

/// The paging options of the incoming request
#[derive(Clone, Copy, Default, Debug)]
pub struct PagingRequest<'a> {
    /// The public continuation token (`$skiptoken`)
    pub continuation_token: Option<&'a str>,
    /// The request has a `$top`
    pub has_top: bool,
    /// The request's `$skip`
    pub skip: usize,
}

/// Paging driven by configured page sizes.
#[derive(Clone, Debug)]
pub struct GenericPaging {
    page_sizes: PageSizes,
}

impl GenericPaging {
    pub fn new(page_sizes: PageSizes) -> Self {
        Self { page_sizes }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(PageSizes::from_config(config))
    }

    /// Determine the requested page.
    ///
    /// Returns `None` when the request is not paged: it has a `$top`,
    /// or the entity has no page size.
    pub fn set_continuation_token(
        &self,
        entity_type: &str,
        request: PagingRequest<'_>,
    ) -> DomainResult<Option<PageState>> {
        if request.has_top {
            return Ok(None);
        }

        let Some(page_size) = self.page_sizes.page_size(simple_type_name(entity_type)) else {
            return Ok(None);
        };

        let (entity_name, page) = match request.continuation_token {
            Some(token) => decode_public_token(token)?,
            None => (simple_type_name(entity_type).to_string(), 1),
        };

        let state = PageState {
            entity_name,
            page,
            page_size,
            current_offset: request.skip,
        };

        let offset_token = state.offset_token()?;
        debug!("page {} of {}: {offset_token}", state.page, state.entity_name);
        Ok(Some(state))
    }

    /// The public token of the page following `state`, or `None` after the last page.
    ///
    /// The query is counted in full, without any paging applied.
    pub fn next_continuation_token(
        &self,
        provider: &QueryProvider,
        expr: &QueryExpr,
        ctx: &RequestContext,
        state: &PageState,
    ) -> DomainResult<Option<String>> {
        let Some(mut operation) = provider.parse(expr) else {
            return Ok(None);
        };

        let ctx = RequestContext {
            context_parameters: ctx.context_parameters.clone(),
            continuation_token: None,
        };

        provider.resolve_compound(&mut operation, &ctx)?;

        operation.top_count = 0;
        operation.skip_count = 0;
        operation.continuation_token = None;
        operation.is_count_request = true;

        let returned_type = operation
            .navigation_element_type(provider.schema())
            .unwrap_or(&operation.of_type);
        let page_size = self
            .page_sizes
            .page_size(simple_type_name(returned_type))
            .unwrap_or(state.page_size);

        let total = match provider.execute_operation(operation, &ctx)? {
            QueryResult::Null => 0,
            QueryResult::Count(count) => usize::try_from(count).unwrap_or_default(),
            QueryResult::Sequence(sequence) => sequence.len(),
        };

        let end = PageState {
            page_size,
            ..state.clone()
        }
        .end()?;

        if end >= total {
            debug!("last page of {} reached", state.entity_name);
            return Ok(None);
        }

        Ok(Some(encode_public_token(&state.entity_name, state.page + 1)))
    }
}

pub fn encode_public_token(entity_name: &str, page: usize) -> String {
    STANDARD.encode(format!("{entity_name}:{page}"))
}

pub fn decode_public_token(token: &str) -> DomainResult<(String, usize)> {
    let invalid = || DomainErrorKind::InvalidContinuationToken.into_error();

    let bytes = STANDARD.decode(token).map_err(|_| invalid())?;
    let token = String::from_utf8(bytes).map_err(|_| invalid())?;
    let (entity_name, page) = token.split_once(':').ok_or_else(invalid)?;
    let page: usize = page.parse().map_err(|_| invalid())?;

    if page == 0 {
        return Err(invalid());
    }

    Ok((entity_name.to_string(), page))
}
