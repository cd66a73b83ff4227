//! Per-endpoint results and their fleet-wide aggregation.

use armada_runtime::RuntimeError;
use armada_schema::EndpointId;
use thiserror::Error;

/// What one endpoint task produced.
///
/// `Completed` is the shape of deploy, clean, build and run; `Listed` is the
/// shape of the list operations. Both aggregation functions accept either
/// variant.
#[derive(Debug)]
pub enum DispatchResult<T> {
    Completed {
        endpoint: EndpointId,
        error: Option<RuntimeError>,
    },
    Listed {
        endpoint: EndpointId,
        values: Vec<T>,
        error: Option<RuntimeError>,
    },
}

impl<T> DispatchResult<T> {
    pub fn completed(endpoint: &EndpointId, result: Result<(), RuntimeError>) -> Self {
        Self::Completed {
            endpoint: endpoint.clone(),
            error: result.err(),
        }
    }

    pub fn listed(endpoint: &EndpointId, result: Result<Vec<T>, RuntimeError>) -> Self {
        let (values, error) = match result {
            Ok(values) => (values, None),
            Err(e) => (Vec::new(), Some(e)),
        };
        Self::Listed {
            endpoint: endpoint.clone(),
            values,
            error,
        }
    }

    pub fn endpoint(&self) -> &EndpointId {
        match self {
            Self::Completed { endpoint, .. } | Self::Listed { endpoint, .. } => endpoint,
        }
    }

    pub fn error(&self) -> Option<&RuntimeError> {
        match self {
            Self::Completed { error, .. } | Self::Listed { error, .. } => error.as_ref(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error().is_none()
    }

    fn into_parts(self) -> (EndpointId, Vec<T>, Option<RuntimeError>) {
        match self {
            Self::Completed { endpoint, error } => (endpoint, Vec::new(), error),
            Self::Listed {
                endpoint,
                values,
                error,
            } => (endpoint, values, error),
        }
    }
}

/// An operation that failed on one endpoint.
#[derive(Debug, Error)]
#[error("{endpoint}: {error}")]
pub struct EndpointFailure {
    pub endpoint: EndpointId,
    #[source]
    pub error: RuntimeError,
}

/// Flattened values from every endpoint plus the endpoints that failed.
///
/// A non-empty `failures` does not void `items`: whatever the healthy
/// endpoints returned is still here.
#[derive(Debug)]
pub struct GroupListing<T> {
    pub items: Vec<T>,
    pub failures: Vec<EndpointFailure>,
}

impl<T> GroupListing<T> {
    /// True when every endpoint answered.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<T> Default for GroupListing<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Keep only the failures. An empty list means every endpoint succeeded.
pub fn collect_failures<T>(results: Vec<DispatchResult<T>>) -> Vec<EndpointFailure> {
    results
        .into_iter()
        .filter_map(|result| {
            let (endpoint, _, error) = result.into_parts();
            error.map(|error| EndpointFailure { endpoint, error })
        })
        .collect()
}

/// Record every error and append every value list, errored or not.
pub fn collect_listing<T>(results: Vec<DispatchResult<T>>) -> GroupListing<T> {
    let mut listing = GroupListing::default();
    for result in results {
        let (endpoint, values, error) = result.into_parts();
        if let Some(error) = error {
            listing.failures.push(EndpointFailure { endpoint, error });
        }
        listing.items.extend(values);
    }
    listing
}

/// Sorted identities of the endpoints named in `failures`.
pub fn failed_endpoints(failures: &[EndpointFailure]) -> Vec<&EndpointId> {
    let mut endpoints: Vec<&EndpointId> = failures.iter().map(|f| &f.endpoint).collect();
    endpoints.sort();
    endpoints
}
