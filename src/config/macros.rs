/// Declarative config structs with inline defaults
///
/// `config_struct!` turns a field list of `name: Type = default` into a struct
/// with public fields, a matching `Default` impl and serde support where every
/// missing TOML key falls back to its default.
///
/// ```
/// fivetran_fetch::config_struct! {
///     pub struct PollConfig {
///         interval_secs: u64 = 30,
///         enabled: bool = true,
///     }
/// }
///
/// let cfg: PollConfig = toml::from_str("interval_secs = 5").unwrap();
/// assert_eq!(cfg.interval_secs, 5);
/// assert!(cfg.enabled);
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $( $field_name: $default_value, )*
                }
            }
        }
    };
}
