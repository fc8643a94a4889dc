//! `define_port_error!`: declares a port error enum with `thiserror`
//! messages and one snake_case constructor per variant.
//!
//! Constructor arguments accept anything convertible into the field type, so
//! `ReportStoreError::query("scan failed")` works for `String` fields.

macro_rules! define_port_error {
    (
        $(#[$enum_attr:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_attr:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $display:expr
            ),* $(,)?
        }
    ) => {
        $(#[$enum_attr])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_attr])*
                #[error($display)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@constructor $variant $( { $($field : $ty),* } )?);
            )*
        }
    };

    (@constructor $variant:ident) => {
        ::paste::paste! {
            #[doc = concat!("Build [`Self::", stringify!($variant), "`].")]
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@constructor $variant:ident { $($field:ident : $ty:ty),* }) => {
        ::paste::paste! {
            #[doc = concat!("Build [`Self::", stringify!($variant), "`].")]
            pub fn [<$variant:snake>]($($field: impl Into<$ty>),*) -> Self {
                Self::$variant { $($field: $field.into()),* }
            }
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    define_port_error! {
        pub enum FeedError {
            Offline { message: String } => "feed offline: {message}",
            Lagging { key: String, behind: u32 } => "feed lagging on {key} by {behind}",
            Closed => "feed closed",
        }
    }

    #[test]
    fn constructors_convert_their_arguments() {
        assert_eq!(
            FeedError::offline("socket reset").to_string(),
            "feed offline: socket reset"
        );
        assert_eq!(
            FeedError::lagging("r-9", 3_u32),
            FeedError::Lagging {
                key: "r-9".to_owned(),
                behind: 3
            }
        );
    }

    #[test]
    fn unit_variants_take_no_arguments() {
        assert_eq!(FeedError::closed(), FeedError::Closed);
        assert_eq!(FeedError::closed().to_string(), "feed closed");
    }
}
