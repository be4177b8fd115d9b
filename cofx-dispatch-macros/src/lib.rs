//! Procedural macros for cofx-dispatch

use darling::{FromDeriveInput, FromMeta, FromVariant};
use proc_macro::TokenStream;
use quote::quote;
use std::collections::HashMap;
use syn::{parse_macro_input, DeriveInput};

/// Container-level attributes for #[derive(Action)]
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(action), supports(enum_any))]
struct ActionOpts {
    ident: syn::Ident,
    data: darling::ast::Data<ActionVariant, ()>,

    /// Prepended to every type string, e.g. `todo/`
    #[darling(default)]
    prefix: Option<String>,

    /// Case convention applied to variant names
    #[darling(default)]
    rename_all: Option<RenameRule>,
}

/// Variant-level attributes
#[derive(Debug, FromVariant)]
#[darling(attributes(action))]
struct ActionVariant {
    ident: syn::Ident,
    fields: darling::ast::Fields<()>,

    /// Explicit type string (still prefixed)
    #[darling(default)]
    rename: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum RenameRule {
    Snake,
    ScreamingSnake,
}

impl FromMeta for RenameRule {
    fn from_string(value: &str) -> darling::Result<Self> {
        match value {
            "snake_case" => Ok(RenameRule::Snake),
            "SCREAMING_SNAKE_CASE" => Ok(RenameRule::ScreamingSnake),
            other => Err(darling::Error::unknown_value(other)),
        }
    }
}

impl RenameRule {
    fn apply(self, variant: &str) -> String {
        let snake = to_snake_case(variant);
        match self {
            RenameRule::Snake => snake,
            RenameRule::ScreamingSnake => snake.to_uppercase(),
        }
    }
}

/// Convert PascalCase to snake_case
fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}

/// Derive macro for the Action trait
///
/// Generates a `name()` method returning the variant's type string. By
/// default that is the variant name; `#[action(rename_all = "...")]` applies
/// `snake_case` or `SCREAMING_SNAKE_CASE`, `#[action(rename = "...")]` on a
/// variant sets it explicitly, and `#[action(prefix = "...")]` on the enum
/// namespaces every type string.
///
/// Two variants resolving to the same type string is a compile error, since
/// waiters registered with `take` could not tell them apart.
///
/// # Example
/// ```ignore
/// #[derive(Action, Clone, Debug)]
/// #[action(prefix = "todo/", rename_all = "SCREAMING_SNAKE_CASE")]
/// enum TodoAction {
///     AddTodo(String),
///     #[action(rename = "CLEAR")]
///     RemoveAll,
/// }
///
/// assert_eq!(TodoAction::AddTodo("milk".into()).name(), "todo/ADD_TODO");
/// assert_eq!(TodoAction::RemoveAll.name(), "todo/CLEAR");
/// ```
#[proc_macro_derive(Action, attributes(action))]
pub fn derive_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let opts = match ActionOpts::from_derive_input(&input) {
        Ok(opts) => opts,
        Err(e) => return e.write_errors().into(),
    };

    let name = &opts.ident;

    let variants = match &opts.data {
        darling::ast::Data::Enum(variants) => variants,
        _ => {
            return syn::Error::new_spanned(&input, "Action can only be derived for enums")
                .to_compile_error()
                .into();
        }
    };

    let prefix = opts.prefix.as_deref().unwrap_or_default();
    let mut seen: HashMap<String, &syn::Ident> = HashMap::new();
    let mut errors = darling::Error::accumulator();
    let mut name_arms = Vec::with_capacity(variants.len());

    for v in variants {
        let variant_name = &v.ident;
        let base = match (&v.rename, opts.rename_all) {
            (Some(explicit), _) => explicit.clone(),
            (None, Some(rule)) => rule.apply(&variant_name.to_string()),
            (None, None) => variant_name.to_string(),
        };
        let type_string = format!("{prefix}{base}");

        if let Some(previous) = seen.insert(type_string.clone(), variant_name) {
            errors.push(
                darling::Error::custom(format!(
                    "type string `{type_string}` is already used by `{previous}`"
                ))
                .with_span(variant_name),
            );
        }

        name_arms.push(match &v.fields.style {
            darling::ast::Style::Unit => quote! {
                #name::#variant_name => #type_string
            },
            darling::ast::Style::Tuple => quote! {
                #name::#variant_name(..) => #type_string
            },
            darling::ast::Style::Struct => quote! {
                #name::#variant_name { .. } => #type_string
            },
        });
    }

    if let Err(e) = errors.finish() {
        return e.write_errors().into();
    }

    // An empty enum has no values to match on.
    let body = if name_arms.is_empty() {
        quote! { match *self {} }
    } else {
        quote! {
            match self {
                #(#name_arms),*
            }
        }
    };

    let expanded = quote! {
        impl cofx_dispatch::Action for #name {
            fn name(&self) -> &'static str {
                #body
            }
        }
    };

    TokenStream::from(expanded)
}
