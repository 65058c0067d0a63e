use fnmesh_core::AppError;

/// Errors that can occur in the data layer (teacher shape: `r2e_data::DataError`).
#[derive(Debug)]
pub enum DataError {
    AppNotFound(String),
    RouteNotFound(String),
    AppAlreadyExists(String),
    RouteAlreadyExists(String),
    RouteConflict(String),
    AppHasRoutes(String),
    /// Precondition violations raised by the [`crate::validator::Validator`]
    /// wrapper (spec §4.2's `DatastoreEmpty*` family).
    Invalid(String),
    Database(Box<dyn std::error::Error + Send + Sync>),
}

impl DataError {
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::AppNotFound(m) => write!(f, "app not found: {m}"),
            DataError::RouteNotFound(m) => write!(f, "route not found: {m}"),
            DataError::AppAlreadyExists(m) => write!(f, "app already exists: {m}"),
            DataError::RouteAlreadyExists(m) => write!(f, "route already exists: {m}"),
            DataError::RouteConflict(m) => write!(f, "route conflicts with an existing wildcard grammar: {m}"),
            DataError::AppHasRoutes(m) => write!(f, "app still has routes: {m}"),
            DataError::Invalid(m) => write!(f, "invalid request: {m}"),
            DataError::Database(e) => write!(f, "database error: {e}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Database(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::AppNotFound(m) => AppError::AppsNotFound(m),
            DataError::RouteNotFound(m) => AppError::RoutesNotFound(m),
            DataError::AppAlreadyExists(m) => AppError::AppsAlreadyExists(m),
            DataError::RouteAlreadyExists(m) => AppError::RoutesAlreadyExists(m),
            DataError::RouteConflict(m) => AppError::RoutesCreate(m),
            DataError::AppHasRoutes(m) => AppError::DeleteAppsWithRoutes(m),
            DataError::Invalid(m) => AppError::BadRequest(m),
            DataError::Database(e) => AppError::Internal(e.to_string()),
        }
    }
}
