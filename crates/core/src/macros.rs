// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros for reducing boilerplate.
//!
//! - [`display_labels!`] — wire labels for unit enums: a `label()` method
//!   plus the matching `Display` impl
//! - [`test_builder!`] — test builder struct with Default, setters, and
//!   `build()`

/// Map a unit enum's variants to stable string labels.
///
/// Generates `pub fn label(&self) -> &'static str` and a `Display` impl
/// that renders it. Every status/event/phase enum in this crate serializes
/// snake_case; the label is that same wire form for log lines and error
/// messages.
#[macro_export]
macro_rules! display_labels {
    ($enum:ident { $( $variant:ident => $label:literal ),+ $(,)? }) => {
        impl $enum {
            /// Stable wire form of the variant.
            pub fn label(&self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

/// Generate a test builder (struct + Default + setters + build).
///
/// All generated items are gated behind `#[cfg(any(test, feature = "test-support"))]`.
///
/// Field groups, all required, in order:
/// - `coerce { field: Type = default }` — setter takes `impl Into<Type>`;
///   the default is converted with `.into()`
/// - `plain { field: Type = default }` — setter takes `Type` directly
/// - `maybe { field: Type }` — target field is `Option<Type>`, defaults to
///   `None`; setter takes `impl Into<Type>` and wraps in `Some`
#[macro_export]
macro_rules! test_builder {
    (
        pub struct $builder:ident => $target:ident {
            coerce { $( $c_field:ident : $c_ty:ty = $c_default:expr ),* $(,)? }
            plain { $( $p_field:ident : $p_ty:ty = $p_default:expr ),* $(,)? }
            maybe { $( $m_field:ident : $m_ty:ty ),* $(,)? }
        }
    ) => {
        #[cfg(any(test, feature = "test-support"))]
        pub struct $builder {
            $( $c_field: $c_ty, )*
            $( $p_field: $p_ty, )*
            $( $m_field: Option<$m_ty>, )*
        }

        #[cfg(any(test, feature = "test-support"))]
        impl Default for $builder {
            fn default() -> Self {
                Self {
                    $( $c_field: $c_default.into(), )*
                    $( $p_field: $p_default, )*
                    $( $m_field: None, )*
                }
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $builder {
            $(
                pub fn $c_field(mut self, v: impl Into<$c_ty>) -> Self {
                    self.$c_field = v.into();
                    self
                }
            )*

            $(
                pub fn $p_field(mut self, v: $p_ty) -> Self {
                    self.$p_field = v;
                    self
                }
            )*

            $(
                pub fn $m_field(mut self, v: impl Into<$m_ty>) -> Self {
                    self.$m_field = Some(v.into());
                    self
                }
            )*

            pub fn build(self) -> $target {
                $target {
                    $( $c_field: self.$c_field, )*
                    $( $p_field: self.$p_field, )*
                    $( $m_field: self.$m_field, )*
                }
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $target {
            /// Create a builder with test defaults.
            pub fn builder() -> $builder {
                $builder::default()
            }
        }
    };
}
