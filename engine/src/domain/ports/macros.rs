//! Defines helper macros for generating domain port error enums.
//!
//! Variants marked with `; transient` after their message are reported by the
//! generated `is_transient()` classifier. Every generated enum converts into a
//! domain [`Error`](crate::domain::Error): transient variants become
//! `transient_store_failure`, everything else becomes `internal_error`.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            #[allow(dead_code, reason = "constructors are generated for every variant")]
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            #[allow(dead_code, reason = "constructors are generated for every variant")]
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };

    (@transient) => { false };
    (@transient transient) => { true };

    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )?
                    => $message:expr $( ; $flag:ident )?
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*

            /// Whether the failure is worth retrying.
            #[must_use]
            pub const fn is_transient(&self) -> bool {
                match self {
                    $( Self::$variant { .. } => define_port_error!(@transient $($flag)?), )*
                }
            }
        }

        impl From<$name> for crate::domain::Error {
            fn from(error: $name) -> Self {
                if error.is_transient() {
                    Self::transient_store_failure(error.to_string())
                } else {
                    Self::internal(error.to_string())
                }
            }
        }
    };
}

pub(crate) use define_port_error;
