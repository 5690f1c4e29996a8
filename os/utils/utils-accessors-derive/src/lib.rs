//! # Accessor Derive
//!
//! Derive macro for `Copy` configuration structs: every named field gets a
//! `const` builder method and a `const` getter, so defaults can be declared in
//! `const` items and overridden fluently.

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, parse_macro_input, spanned::Spanned};

/// Generates, for each **named** field `name: Ty`:
///
/// - `pub const fn with_name(mut self, value: Ty) -> Self`
/// - `pub const fn name(&self) -> Ty` (the field type must be `Copy`)
///
/// Options, per field:
///
/// - `#[accessors(skip)]`: generate nothing for this field.
/// - `#[accessors(no_get)]`: only generate the builder.
///
/// Doc comments on the field are repeated on the getter.
///
/// # Example
///
/// ```
/// use utils_accessors_derive::Accessors;
///
/// #[derive(Clone, Copy, Accessors)]
/// struct Limits {
///     /// Largest accepted payload.
///     max_len: usize,
///     #[accessors(no_get)]
///     strict: bool,
///     #[accessors(skip)]
///     _reserved: u8,
/// }
///
/// const DEFAULT: Limits = Limits { max_len: 16, strict: false, _reserved: 0 };
/// const BIG: Limits = DEFAULT.with_max_len(1024).with_strict(true);
/// assert_eq!(BIG.max_len(), 1024);
/// ```
#[proc_macro_derive(Accessors, attributes(accessors))]
pub fn derive_accessors(input: TokenStream) -> TokenStream {
    let DeriveInput {
        ident,
        generics,
        data,
        ..
    } = parse_macro_input!(input as DeriveInput);

    let fields = match data {
        Data::Struct(s) => match s.fields {
            Fields::Named(n) => n.named,
            Fields::Unnamed(u) => {
                return syn::Error::new(u.span(), "Accessors only supports named fields")
                    .to_compile_error()
                    .into();
            }
            Fields::Unit => {
                return syn::Error::new(ident.span(), "Accessors does not apply to unit structs")
                    .to_compile_error()
                    .into();
            }
        },
        _ => {
            return syn::Error::new(ident.span(), "Accessors can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let mut methods = Vec::new();

    for field in fields {
        let Some(fname) = &field.ident else { continue };
        let options = match FieldOptions::parse(&field.attrs) {
            Ok(options) => options,
            Err(e) => return e.to_compile_error().into(),
        };
        if options.skip {
            continue;
        }

        let ty = &field.ty;
        let with_name = format_ident!("with_{}", fname);
        let docs = field.attrs.iter().filter(|a| a.path().is_ident("doc"));
        let with_doc = format!("Returns a copy with `{fname}` replaced.");

        methods.push(quote! {
            #[doc = #with_doc]
            #[inline]
            #[must_use]
            pub const fn #with_name(mut self, value: #ty) -> Self {
                self.#fname = value;
                self
            }
        });

        if !options.no_get {
            methods.push(quote! {
                #(#docs)*
                #[inline]
                #[must_use]
                pub const fn #fname(&self) -> #ty {
                    self.#fname
                }
            });
        }
    }

    let expanded = quote! {
        impl #impl_generics #ident #ty_generics #where_clause {
            #(#methods)*
        }
    };

    TokenStream::from(expanded)
}

#[derive(Default)]
struct FieldOptions {
    skip: bool,
    no_get: bool,
}

impl FieldOptions {
    fn parse(attrs: &[syn::Attribute]) -> syn::Result<Self> {
        let mut options = Self::default();
        for attr in attrs {
            if !attr.path().is_ident("accessors") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    options.skip = true;
                    Ok(())
                } else if meta.path.is_ident("no_get") {
                    options.no_get = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `skip` or `no_get`"))
                }
            })?;
        }
        Ok(options)
    }
}
