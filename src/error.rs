//! Error types for the order service core.

use std::fmt;

/// Result type for every operation in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Payload field that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    CarName,
    DayRate,
    MonthRate,
    Image,
    CarId,
    OrderDate,
    PickupDate,
    DropoffDate,
    PickupLocation,
    PickupLat,
    PickupLong,
    DropoffLocation,
    DropoffLat,
    DropoffLong,
}

impl Field {
    fn index(self) -> u32 {
        self as u32
    }

    fn describe(self) -> (&'static str, &'static str) {
        match self {
            Field::CarName => ("Kolom nama mobil tidak valid!", "Car's name field is invalid!"),
            Field::DayRate => ("Kolom biaya harian tidak valid!", "Day rate field is invalid!"),
            Field::MonthRate => (
                "Kolom biaya bulanan tidak valid!",
                "Month rate field is invalid!",
            ),
            Field::Image => ("Kolom gambar tidak valid!", "Image field is invalid!"),
            Field::CarId => ("Kolom mobil harus diisi!", "Car field should not be empty!"),
            Field::OrderDate => (
                "Kolom tanggal pemesanan harus diisi!",
                "Order date field should not be empty!",
            ),
            Field::PickupDate => (
                "Kolom tanggal penjemputan harus diisi!",
                "Pickup date field should not be empty!",
            ),
            Field::DropoffDate => (
                "Kolom tanggal pengantaran harus diisi!",
                "Dropoff date field should not be empty!",
            ),
            Field::PickupLocation => (
                "Kolom lokasi penjemputan harus diisi!",
                "Pickup location field should not be empty!",
            ),
            Field::PickupLat => (
                "Kolom garis lintang penjemputan harus diisi!",
                "Pickup latitude field should not be empty!",
            ),
            Field::PickupLong => (
                "Kolom garis bujur penjemputan harus diisi!",
                "Pickup longitude field should not be empty!",
            ),
            Field::DropoffLocation => (
                "Kolom lokasi pengantaran harus diisi!",
                "Dropoff location should not be empty!",
            ),
            Field::DropoffLat => (
                "Kolom garis lintang pengantaran harus diisi!",
                "Dropoff latitude field should not be empty!",
            ),
            Field::DropoffLong => (
                "Kolom garis bujur pengantaran harus diisi!",
                "Dropoff longitude field should not be empty!",
            ),
        }
    }
}

/// User-facing rendering of an error: code, HTTP status and a bilingual message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorMessage {
    pub code: u32,
    pub status: u16,
    /// Indonesian message.
    pub message: &'static str,
    /// English translation.
    pub en: &'static str,
}

/// Error kinds surfaced by managers, repositories and cache clients.
///
/// Every data-layer failure is wrapped into one of these kinds with a
/// human-readable context message. The wrapped text is for logs only;
/// end users see [`Error::message`].
#[derive(Debug, Clone)]
pub enum Error {
    /// Malformed input, or a filter/value that could not be (de)serialized.
    BadRequest(String),

    /// Transaction begin or commit failed.
    Transaction(String),

    /// Insert statement failed; the transaction was rolled back.
    Insert(String),

    /// Update statement failed; the transaction was rolled back.
    Update(String),

    /// Hard or soft delete failed; the transaction was rolled back.
    Delete(String),

    /// Read query (count, page or single) failed.
    Get(String),

    /// Strict existence check found no row.
    NotFound(String),

    /// Inter-service call failed, including pool acquisition and timeouts.
    UpstreamClient(String),

    /// Payload field violates the validation rules.
    Invalid { field: Field, reason: String },

    /// Key absent from the cache.
    ///
    /// This is the only cache outcome that makes a manager fall back to the
    /// store. It never leaves the manager.
    CacheMiss,

    /// Cache backend error (connection lost, protocol error, ...).
    BackendError(String),

    /// Raw driver error, before a repository wraps it into an operation kind.
    Database(String),

    /// Operation exceeded its deadline.
    Timeout(String),

    /// Invalid or missing configuration.
    ConfigError(String),
}

impl Error {
    /// Numeric code, HTTP status and bilingual message for this error.
    pub fn message(&self) -> ErrorMessage {
        const STORE_CREATE: (&str, &str) = (
            "Terdapat kesalahan dalam pembuatan data!",
            "There was an error in creating the data",
        );
        const INTERNAL: (&str, &str) = (
            "Terjadi kesalahan pada server. Silakan coba lagi!",
            "Internal server error. Please try again!",
        );

        let (code, status, (message, en)) = match self {
            Error::BadRequest(_) => (
                40000,
                400,
                (
                    "Kesalahan input. Silakan cek kembali masukan anda!",
                    "Invalid input. Please validate your input!",
                ),
            ),
            Error::Transaction(_) => (40001, 400, STORE_CREATE),
            Error::Insert(_) => (40004, 400, STORE_CREATE),
            Error::Update(_) => (
                40005,
                400,
                (
                    "Terdapat kesalahan dalam mengubah data!",
                    "There was an error in updating the data",
                ),
            ),
            Error::Delete(_) => (
                40006,
                400,
                (
                    "Terdapat kesalahan dalam menghapus data!",
                    "There was an error in deleting the data",
                ),
            ),
            Error::Get(_) => (
                40007,
                400,
                (
                    "Terdapat kesalahan dalam pengambilan data!",
                    "There was an error in get data!",
                ),
            ),
            Error::UpstreamClient(_) => (
                40008,
                400,
                (
                    "Terdapat kesalahan dalam proses pengiriman data!",
                    "There was an error in data delivering",
                ),
            ),
            Error::Invalid { field, .. } => (40009 + field.index(), 400, field.describe()),
            Error::NotFound(_) => (404000, 404, ("Data tidak ditemukan!", "Data not found!")),
            Error::CacheMiss
            | Error::BackendError(_)
            | Error::Database(_)
            | Error::Timeout(_)
            | Error::ConfigError(_) => (500000, 500, INTERNAL),
        };

        ErrorMessage {
            code,
            status,
            message,
            en,
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        self.message().status
    }

    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Error::CacheMiss)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Error::Transaction(msg) => write!(f, "Transaction error: {}", msg),
            Error::Insert(msg) => write!(f, "Insert error: {}", msg),
            Error::Update(msg) => write!(f, "Update error: {}", msg),
            Error::Delete(msg) => write!(f, "Delete error: {}", msg),
            Error::Get(msg) => write!(f, "Get error: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::UpstreamClient(msg) => write!(f, "Upstream client error: {}", msg),
            Error::Invalid { field, reason } => write!(f, "Invalid {:?}: {}", field, reason),
            Error::CacheMiss => write!(f, "Cache miss"),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::Database(msg) => write!(f, "Database error: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::BadRequest(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::BackendError(format!("Redis error: {}", e))
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Database(e.to_string())
    }
}
