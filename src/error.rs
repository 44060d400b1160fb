use thiserror::Error;

/// Reasons a personalization key typed by a student is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("Por favor, ingresa tu clave para generar las hojas de trabajo.")]
    Empty,
    #[error("La clave debe ser un número entero válido.")]
    NotInteger,
    #[error("La clave debe ser un número entero positivo.")]
    NotPositive,
    #[error("La clave no puede ser mayor que {max}.")]
    TooLarge { max: i64 },
}

/// Failures talking to the submission store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("error de red: {0}")]
    Network(String),

    #[error("respuesta HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The store accepted the request but returned no inserted row.
    #[error("el almacén no confirmó la inserción")]
    NotConfirmed,

    #[error("respuesta ilegible: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StorageError::Decode(e.to_string())
        } else {
            StorageError::Network(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// A chat tried to hand in a worksheet that is not in its set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("La hoja {} no existe; elige otra hoja.", .index + 1)]
pub struct UnknownWorksheet {
    pub index: usize,
}
