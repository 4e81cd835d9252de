pub use crate::circuit_breaker::{CircuitBreakerState, CircuitState};
pub use crate::collaborators::{BrandMetadataReader, QueryMetadata, QueryMetadataReader, Scorer};
pub use crate::collector_config::{CollectorConfig, ProviderSpec};
pub use crate::collector_result::{CollectorResult, CollectorResultStatus};
pub use crate::error::{CollectorError, ErrorKind, ErrorSeverity, StoreError};
pub use crate::execution::{Attempt, Execution, ExecutionStatus, StatusTransition};
pub use crate::ids::{BrandId, CollectorResultId, CustomerId, ExecutionId, QueryId};
pub use crate::request::Request;
pub use crate::store::{CollectorResultPatch, CollectorStore, ExecutionPatch};
