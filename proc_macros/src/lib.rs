// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Derive macros that mirror the library's Rust types into C-compatible
//! types for cbindgen.

use darling::FromDeriveInput;
use darling::FromField;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::format_ident;
use quote::quote;
use syn::parse_macro_input;
use syn::Data;
use syn::DeriveInput;
use syn::Field;
use syn::Fields;
use syn::Ident;
use syn::Variant;

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(c_api))]
struct WrapperOpts {
    ident: Ident,
    /// The prefix to uniquely identify the type for cbindgen.
    prefix: String,
    /// Whether the type should be annotated as repr_c. A wrapper that is only
    /// ever handed to C behind a pointer does not need to be repr(C).
    #[darling(default)]
    repr_c: bool,
    /// Controls whether a From impl is generated automatically. It's less
    /// cumbersome to do so by hand for a few types.
    #[darling(default)]
    manual_from_impl: bool,
}

#[derive(Debug, FromField)]
#[darling(attributes(c_api))]
struct FieldOpts {
    /// Do not prefix the type.
    #[darling(default)]
    no_prefix: bool,
    /// Use this type in the mirror instead of the prefixed field type. This is
    /// needed when the field type lives in a module with another prefix.
    rename_type: Option<String>,
}

/// Derive a C API wrapper for a struct or enum.
///
/// A prefix must be used to uniquely identify the new type, as cbindgen is not
/// aware of Rust namespaces.
///
/// The wrappers can be converted from/to its native Rust types with from() and
/// into(). Every wrapper also gets `<Wrapper>_printf` and `<Wrapper>_snprintf`
/// C entry points that render the value in its debug form.
#[proc_macro_derive(CApiWrapper, attributes(c_api))]
pub fn c_api_wrapper_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let opts = match WrapperOpts::from_derive_input(&input) {
        Ok(v) => v,
        Err(e) => return TokenStream::from(e.write_errors()),
    };

    let name = &opts.ident;
    let new_name = Ident::new(&format!("{}{}", &opts.prefix, name), name.span());

    let repr_c_token = if opts.repr_c {
        quote!(#[repr(C)])
    } else {
        quote!()
    };

    let derives = quote!(#[derive(Debug, Clone, PartialEq)]);

    let definition = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(_) => {
                let field_names: Vec<_> = data
                    .fields
                    .iter()
                    .map(|Field { ident, .. }| ident.clone())
                    .collect();

                let mut fields = Vec::new();
                for field in &data.fields {
                    match prefix_struct_field_types(&opts, field) {
                        Ok(field) => fields.push(field),
                        Err(err) => return TokenStream::from(err.to_compile_error()),
                    }
                }

                let from_impl = if opts.manual_from_impl {
                    quote!()
                } else {
                    quote! {
                        #[cfg(feature = "c_api")]
                        impl From<#name> for #new_name {
                            fn from(item: #name) -> Self {
                                #new_name {
                                    #(#field_names: item.#field_names.into()),*
                                }
                            }
                        }

                        #[cfg(feature = "c_api")]
                        impl From<#new_name> for #name {
                            fn from(item: #new_name) -> Self {
                                #name {
                                    #(#field_names: item.#field_names.into()),*
                                }
                            }
                        }
                    }
                };

                quote! {
                    #[cfg(feature = "c_api")]
                    #repr_c_token
                    #derives
                    pub(crate) struct #new_name {
                        #(#fields),*
                    }

                    #from_impl
                }
            }
            _ => {
                return TokenStream::from(
                    syn::Error::new_spanned(name, "CApiWrapper needs named fields")
                        .to_compile_error(),
                )
            }
        },
        Data::Enum(data) => {
            let mut variants = Vec::new();
            for variant in &data.variants {
                match prefix_enum_variants(variant) {
                    Ok(variant) => variants.push(variant),
                    Err(err) => return TokenStream::from(err.to_compile_error()),
                }
            }

            let from_old_match_arms: Vec<_> = data
                .variants
                .iter()
                .map(|Variant { ident, fields, .. }| match fields {
                    Fields::Unit => quote! { #name::#ident => #new_name::#ident },
                    _ => quote! { #name::#ident(v) => #new_name::#ident(v.into()) },
                })
                .collect();

            let from_new_match_arms: Vec<_> = data
                .variants
                .iter()
                .map(|Variant { ident, fields, .. }| match fields {
                    Fields::Unit => quote! { #new_name::#ident => #name::#ident },
                    _ => quote! { #new_name::#ident(v) => #name::#ident(v.into()) },
                })
                .collect();

            quote! {
                #[cfg(feature = "c_api")]
                #repr_c_token
                #derives
                pub(crate) enum #new_name {
                    #(#variants),*
                }

                #[cfg(feature = "c_api")]
                impl From<#name> for #new_name {
                    fn from(item: #name) -> Self {
                        match item {
                            #(#from_old_match_arms),*
                        }
                    }
                }

                #[cfg(feature = "c_api")]
                impl From<#new_name> for #name {
                    fn from(item: #new_name) -> Self {
                        match item {
                            #(#from_new_match_arms),*
                        }
                    }
                }
            }
        }
        Data::Union(_) => {
            return TokenStream::from(
                syn::Error::new_spanned(name, "CApiWrapper only works on structs and enums")
                    .to_compile_error(),
            )
        }
    };

    let printers = printers(&new_name);

    TokenStream::from(quote! {
        #definition
        #printers
    })
}

/// The `_printf` and `_snprintf` entry points for a wrapper.
fn printers(new_name: &Ident) -> TokenStream2 {
    let printf = format_ident!("{}_printf", new_name);
    let snprintf = format_ident!("{}_snprintf", new_name);

    quote! {
        #[cfg(feature = "c_api")]
        impl #new_name {
            #[no_mangle]
            #[allow(non_snake_case)]
            /// Prints the value to stdout.
            ///
            /// # Returns
            /// 0 on success, -EINVAL if `this` is NULL.
            ///
            /// # Safety
            /// `this` must be NULL or point to a valid value.
            extern "C" fn #printf(this: *const Self) -> std::ffi::c_int {
                match unsafe { this.as_ref() } {
                    Some(this) => {
                        println!("{:#?}", this);
                        0
                    }
                    None => -::nix::libc::EINVAL,
                }
            }

            #[no_mangle]
            #[allow(non_snake_case)]
            /// Renders the value into `buf`, which holds `len` bytes. The
            /// output is truncated to fit and is always NUL-terminated when
            /// `len` is not zero.
            ///
            /// # Returns
            /// The length of the full rendering, excluding the terminator, or
            /// -EINVAL if `this` is NULL, or if `buf` is NULL while `len` is
            /// not zero.
            ///
            /// # Safety
            /// `this` must be NULL or point to a valid value. `buf` must be
            /// valid for writes of `len` bytes.
            extern "C" fn #snprintf(
                this: *const Self,
                buf: *mut std::ffi::c_char,
                len: usize,
            ) -> std::ffi::c_int {
                let this = match unsafe { this.as_ref() } {
                    Some(this) => this,
                    None => return -::nix::libc::EINVAL,
                };
                if buf.is_null() && len != 0 {
                    return -::nix::libc::EINVAL;
                }

                let text = format!("{:#?}", this);
                if len != 0 {
                    let n = text.len().min(len - 1);
                    unsafe {
                        std::ptr::copy_nonoverlapping(text.as_ptr(), buf as *mut u8, n);
                        *buf.add(n) = 0;
                    }
                }
                std::ffi::c_int::try_from(text.len()).unwrap_or(std::ffi::c_int::MAX)
            }
        }
    }
}

// These types are not prefixed.
fn is_whitelisted_type(ty_string: &str) -> bool {
    let whitelisted_types = [
        "bool",
        "char",
        "i8",
        "i16",
        "i32",
        "i64",
        "isize",
        "u8",
        "u16",
        "u32",
        "u64",
        "usize",
        "BcdWrapper",
        "Milliohm",
        "Millivolt",
        "Milliamp",
        "Milliwatt",
    ];
    whitelisted_types.contains(&ty_string)
}

fn prefix_struct_field_types(opts: &WrapperOpts, f: &Field) -> syn::Result<TokenStream2> {
    let field_opt =
        FieldOpts::from_field(f).map_err(|err| syn::Error::new_spanned(f, err.to_string()))?;

    let Field { ident, ty, .. } = f;
    let ty_string = quote! { #ty }.to_string();

    // Any non-primitive type is prefixed by default.
    if let Some(new_name) = field_opt.rename_type {
        let new_ty = syn::parse_str::<syn::Type>(&new_name)?;
        Ok(quote! { pub(crate) #ident: #new_ty })
    } else if !is_whitelisted_type(&ty_string) && !field_opt.no_prefix {
        let new_ty = format_ident!("{}{}", &opts.prefix, ty_string);
        Ok(quote! { pub(crate) #ident: #new_ty })
    } else {
        Ok(quote! { pub(crate) #ident: #ty })
    }
}

// Enum variants carrying data must use a type alias to be named the same as
// the C type. Such aliases live in a `c_api` module next to the enum, which
// disambiguates the wrapper from the alias.
//
// See libtypec_rs::pd::Pdo for an example.
fn prefix_enum_variants(variant: &Variant) -> syn::Result<TokenStream2> {
    let ident = variant.ident.clone();

    match &variant.fields {
        Fields::Unit => Ok(quote! { #ident }),
        Fields::Unnamed(fields) => {
            let fields: Vec<_> = fields
                .unnamed
                .iter()
                .map(|field| {
                    let inner_data_type = &field.ty;
                    let ty_string = quote! { #inner_data_type }.to_string();
                    if is_whitelisted_type(&ty_string) {
                        quote! { #inner_data_type }
                    } else {
                        quote! { c_api::#inner_data_type }
                    }
                })
                .collect();
            Ok(quote! { #ident(#(#fields),*) })
        }
        Fields::Named(_) => Err(syn::Error::new_spanned(
            variant,
            "CApiWrapper does not support struct-like variants",
        )),
    }
}
