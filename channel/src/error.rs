use std::borrow::Cow;

use rendezvous_model::IpcError;

use crate::protocol::kernel::process_table::RegisterError;

#[derive(Debug)]
pub struct Error {
    pub context: Cow<'static, str>,
    pub kind: ErrorKind,
}

impl Error {
    pub fn contextual<T: Into<ErrorKind>>(
        context: impl Into<Cow<'static, str>>,
    ) -> impl FnOnce(T) -> Self {
        move |kind| Self {
            context: context.into(),
            kind: kind.into(),
        }
    }
    pub fn new(context: impl Into<Cow<'static, str>>, kind: impl Into<ErrorKind>) -> Self {
        Self {
            context: context.into(),
            kind: kind.into(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.context, self.kind)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.inner()
    }
}

macro_rules! error_kind {
    (
        pub enum $ErrorKind: ident {
            $($Kind: ident: $InnerType: ty)*
        }
    ) => {
        #[derive(Debug)]
        pub enum $ErrorKind {
            $($Kind($InnerType),)*
        }
        $(
            impl From<$InnerType> for $ErrorKind {
                fn from(e: $InnerType) -> Self {
                    $ErrorKind::$Kind(e)
                }
            }
        )*
        impl $ErrorKind {
            fn inner(&self) -> Option<&(dyn std::error::Error + 'static)> {
                match self {
                    $($ErrorKind::$Kind(e) => Some(e),)*
                }
            }
        }
        impl std::fmt::Display for $ErrorKind {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $($ErrorKind::$Kind(e) => std::fmt::Display::fmt(e, f),)*
                }
            }
        }
    };
}
error_kind! {
    pub enum ErrorKind {
        Register: RegisterError
        Ipc: IpcError
    }
}
