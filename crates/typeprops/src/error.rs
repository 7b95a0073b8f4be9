use thiserror::Error;

/// Error codes prefixed by phase: T = type descriptor, D = declaration,
/// V = validation, C = construction, S = serialization, L = lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Type descriptors
    T001, // not a nominal type reference
    T002, // empty union / intersection / enum

    // Declaration
    D001, // malformed prop or serialized name
    D002, // both default and factory
    D003, // both array and enum sugar
    D004, // both foreign and foreign_hint_only
    D005, // prop name collides with an existing method
    D006, // prop already declared
    D007, // override of an undeclared prop
    D008, // deprecated optional spelling
    D009, // redaction without sensitivity
    D010, // foreign sugar on an unsupported field type
    D011, // rule key not accepted by any installed plugin
    D012, // custom type not registered
    D013, // default value invalid for the field type
    D014, // nil-write option on a required prop, or both nil-write options
    D015, // banned class used without allow_banned_type
    D016, // class already has a live prop decorator

    // Validation
    V001, // wrong type
    V002, // nil written to a required prop
    V003, // write to an immutable prop

    // Construction
    C001, // missing required prop
    C002, // unrecognized constructor keys
    C003, // wrong argument shape

    // Serialization
    S001, // required prop not set
    S002, // unknown keys in strict deserialize
    S003, // custom type produced a non-scalar
    S004, // required prop deserialized from nil without default

    // Lookup
    L001, // no such prop
    L002, // no such method
    L003, // private method called
    L004, // foreign class could not be resolved or loaded
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::T001 => "T001",
            Self::T002 => "T002",
            Self::D001 => "D001",
            Self::D002 => "D002",
            Self::D003 => "D003",
            Self::D004 => "D004",
            Self::D005 => "D005",
            Self::D006 => "D006",
            Self::D007 => "D007",
            Self::D008 => "D008",
            Self::D009 => "D009",
            Self::D010 => "D010",
            Self::D011 => "D011",
            Self::D012 => "D012",
            Self::D013 => "D013",
            Self::D014 => "D014",
            Self::D015 => "D015",
            Self::D016 => "D016",
            Self::V001 => "V001",
            Self::V002 => "V002",
            Self::V003 => "V003",
            Self::C001 => "C001",
            Self::C002 => "C002",
            Self::C003 => "C003",
            Self::S001 => "S001",
            Self::S002 => "S002",
            Self::S003 => "S003",
            Self::S004 => "S004",
            Self::L001 => "L001",
            Self::L002 => "L002",
            Self::L003 => "L003",
            Self::L004 => "L004",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.as_str().as_bytes()[0] {
            b'T' | b'D' => ErrorKind::Declaration,
            b'V' => ErrorKind::InvalidValue,
            b'C' => ErrorKind::Argument,
            b'S' => match self {
                Self::S002 | Self::S004 => ErrorKind::Argument,
                _ => ErrorKind::InvalidValue,
            },
            _ => ErrorKind::Lookup,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad error families, mirroring the host's exception classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raised while a class is being declared. Aborts class loading.
    Declaration,
    /// `InvalidValueError` / `TypeError`: a value failed its prop type.
    InvalidValue,
    /// `ArgumentError`: malformed constructor or deserialize input.
    Argument,
    /// Unknown prop, method or foreign target.
    Lookup,
}

// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropError {
    #[error("[{code}] invalid type descriptor: {message}")]
    InvalidTypeDescriptor { code: ErrorCode, message: String },

    #[error("[{code}] {class}.{prop}: {message}")]
    Declaration { code: ErrorCode, class: String, prop: String, message: String },

    #[error("[D016] {class} already declares props through another decorator")]
    AlreadyDecorated { class: String },

    #[error("[V001] Can't set {class}.{prop} to {value} (instance of {value_class}) - need a {expected}")]
    WrongType { class: String, prop: String, value: String, value_class: String, expected: String },

    #[error("[V002] Can't set {class}.{prop} to nil (instance of NilClass) - need a {expected}")]
    NilNotAllowed { class: String, prop: String, expected: String },

    #[error("[V003] {class}.{prop} is immutable")]
    Immutable { class: String, prop: String },

    #[error("[C001] Missing required prop `{prop}` for class `{class}`")]
    MissingRequired { class: String, prop: String },

    #[error("[C002] {class}: Unrecognized properties: {}", .keys.join(", "))]
    UnrecognizedProps { class: String, keys: Vec<String> },

    #[error("[C003] {message}")]
    BadArguments { message: String },

    #[error("[S001] {class}.{prop} not set for non-optional prop")]
    NotSet { class: String, prop: String },

    #[error("[S002] Unknown properties for {class}: {keys:?}")]
    UnknownProps { class: String, keys: Vec<String> },

    #[error("[S003] {type_name} did not serialize to a valid scalar type. It became a: {got}{}", hint_suffix(.hash_hint))]
    InvalidSerialization { type_name: String, got: String, hash_hint: bool },

    #[error("[S004] tried to deserialize required prop {class}.{prop} from a nil value; provide a default or factory")]
    RequiredFromNil { class: String, prop: String },

    #[error("[L001] No such prop: {class}.{prop}")]
    NoSuchProp { class: String, prop: String },

    #[error("[L002] undefined method `{method}' for {class}")]
    NoSuchMethod { class: String, method: String },

    #[error("[L003] private method `{method}' called for {class}")]
    PrivateMethod { class: String, method: String },

    #[error("[L004] {class}.{prop}: {message}")]
    Foreign { class: String, prop: String, message: String },
}

fn hint_suffix(hash_hint: &bool) -> &'static str {
    if *hash_hint {
        "\nIf you want to store a structured Hash, consider using a prop class as your type."
    } else {
        ""
    }
}

impl PropError {
    pub(crate) fn declaration(
        code: ErrorCode,
        class: &str,
        prop: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::Declaration {
            code,
            class: class.to_string(),
            prop: prop.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_type(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::InvalidTypeDescriptor { code, message: message.into() }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidTypeDescriptor { code, .. } | Self::Declaration { code, .. } => *code,
            Self::AlreadyDecorated { .. }      => ErrorCode::D016,
            Self::WrongType { .. }             => ErrorCode::V001,
            Self::NilNotAllowed { .. }         => ErrorCode::V002,
            Self::Immutable { .. }             => ErrorCode::V003,
            Self::MissingRequired { .. }       => ErrorCode::C001,
            Self::UnrecognizedProps { .. }     => ErrorCode::C002,
            Self::BadArguments { .. }          => ErrorCode::C003,
            Self::NotSet { .. }                => ErrorCode::S001,
            Self::UnknownProps { .. }          => ErrorCode::S002,
            Self::InvalidSerialization { .. }  => ErrorCode::S003,
            Self::RequiredFromNil { .. }       => ErrorCode::S004,
            Self::NoSuchProp { .. }            => ErrorCode::L001,
            Self::NoSuchMethod { .. }          => ErrorCode::L002,
            Self::PrivateMethod { .. }         => ErrorCode::L003,
            Self::Foreign { .. }               => ErrorCode::L004,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }

    /// True for the two setter failures (`wrong type`, `nil not allowed`).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::WrongType { .. } | Self::NilNotAllowed { .. })
    }
}

pub type Result<T, E = PropError> = std::result::Result<T, E>;
