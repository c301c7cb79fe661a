// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use proc_macro_error::{abort, proc_macro_error};
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

fn get_bits(expr_call: &syn::ExprCall) -> syn::Expr {
    if let syn::Expr::Path(ep) = &*expr_call.func {
        if !ep.path.is_ident("Bits") {
            abort!(expr_call, "Unexpected function name in coder");
        }
        if expr_call.args.len() != 1 {
            abort!(
                expr_call,
                "Unexpected number of arguments for Bits() in coder: {}",
                expr_call.args.len()
            );
        }
        return expr_call.args[0].clone();
    }
    abort!(expr_call, "Unexpected function call in coder");
}

/// Splits `a + lit` / `lit + a` into `(a, lit)`.
fn split_offset(input: &syn::Expr) -> Option<(&syn::Expr, &syn::ExprLit)> {
    if let syn::Expr::Binary(syn::ExprBinary {
        left,
        op: syn::BinOp::Add(_),
        right,
        ..
    }) = input
    {
        match (&**left, &**right) {
            (other, syn::Expr::Lit(lit)) | (syn::Expr::Lit(lit), other) => Some((other, lit)),
            _ => None,
        }
    } else {
        None
    }
}

fn parse_single_coder(input: &syn::Expr, extra_lit: Option<&syn::ExprLit>) -> TokenStream2 {
    let u32_path = quote! {crate::fields::encodings::U32};
    if let syn::Expr::Lit(lit) = input {
        return match extra_lit {
            None => quote! {#u32_path::Val(#lit)},
            Some(elit) => quote! {#u32_path::Val(#lit + #elit)},
        };
    }
    if let syn::Expr::Call(expr_call) = input {
        let bits = get_bits(expr_call);
        return match extra_lit {
            None => quote! {#u32_path::Bits(#bits)},
            Some(elit) => quote! {#u32_path::BitsOffset{n: #bits, off: #elit}},
        };
    }
    if let Some((syn::Expr::Call(expr_call), lit)) = split_offset(input) {
        let bits = get_bits(expr_call);
        return match extra_lit {
            None => quote! {#u32_path::BitsOffset{n: #bits, off: #lit}},
            Some(elit) => quote! {#u32_path::BitsOffset{n: #bits, off: #lit + #elit}},
        };
    }
    abort!(
        input,
        "Unexpected expression in coder, must be Bits(a) + b, Bits(a), or b"
    );
}

fn parse_coder(input: &syn::Expr) -> TokenStream2 {
    let coder_path = quote! {crate::fields::encodings::U32Coder};
    let (call, lit) = match input {
        syn::Expr::Call(expr_call) => (Some(expr_call), None),
        _ => match split_offset(input) {
            Some((syn::Expr::Call(expr_call), lit)) => (Some(expr_call), Some(lit)),
            _ => (None, None),
        },
    };
    if let Some(expr_call) = call {
        if let syn::Expr::Path(ep) = &*expr_call.func {
            if ep.path.is_ident("u2S") {
                if expr_call.args.len() != 4 {
                    abort!(
                        input,
                        "Unexpected number of arguments for u2S() in coder: {}",
                        expr_call.args.len()
                    );
                }
                let args = expr_call
                    .args
                    .iter()
                    .map(|arg| parse_single_coder(arg, lit));
                return quote! {#coder_path::Select(#(#args),*)};
            }
        }
    }
    let single = parse_single_coder(input, None);
    quote! {#coder_path::Direct(#single)}
}

fn is_primitive_type(ty: &syn::Type, sty: &str) -> bool {
    if let syn::Type::Path(syn::TypePath { qself: _, path }) = ty {
        path.is_ident(sty)
    } else {
        false
    }
}

#[derive(Debug)]
enum Type {
    Nested,
    Bool,
    U32(TokenStream2),
}

#[derive(Debug)]
struct Field {
    name: proc_macro2::Ident,
    condition: Option<syn::Expr>,
    default: TokenStream2,
    ty: Type,
    skip: bool,
    all_default: bool,
}

impl Field {
    fn parse(f: &syn::Field) -> Field {
        let mut condition = None;
        let mut default = None;
        let mut coder = None;
        let mut skip = false;
        let mut all_default = false;

        // Parse attributes; anything that is not ours (docs, lints) is left alone.
        for a in &f.attrs {
            if a.path.is_ident("coder") {
                if coder.is_some() {
                    abort!(f, "Repeated coder");
                }
                let coder_ast = match a.parse_args::<syn::Expr>() {
                    Ok(expr) => expr,
                    Err(e) => abort!(a, "Invalid coder: {}", e),
                };
                coder = Some(parse_coder(&coder_ast));
            } else if a.path.is_ident("default") {
                if default.is_some() {
                    abort!(f, "Repeated default");
                }
                let default_expr = match a.parse_args::<syn::Expr>() {
                    Ok(expr) => expr,
                    Err(e) => abort!(a, "Invalid default: {}", e),
                };
                default = Some(quote! {#default_expr});
            } else if a.path.is_ident("condition") {
                if condition.is_some() {
                    abort!(f, "Repeated condition");
                }
                condition = match a.parse_args::<syn::Expr>() {
                    Ok(expr) => Some(expr),
                    Err(e) => abort!(a, "Invalid condition: {}", e),
                };
            } else if a.path.is_ident("skip") {
                skip = true;
            } else if a.path.is_ident("all_default") {
                all_default = true;
            }
        }

        let ty = if skip {
            if coder.is_some() || condition.is_some() || all_default {
                abort!(f, "Skipped fields are never coded");
            }
            if default.is_none() {
                default = Some(quote! {::core::default::Default::default()});
            }
            Type::Nested
        } else if is_primitive_type(&f.ty, "bool") {
            if coder.is_some() {
                abort!(f, "Cannot specify coder for bool");
            }
            if default.is_none() {
                default = Some(if all_default {
                    quote! {true}
                } else {
                    quote! {false}
                });
            }
            Type::Bool
        } else if is_primitive_type(&f.ty, "u32") {
            if all_default {
                abort!(f, "all_default must be a bool");
            }
            let coder = match coder {
                Some(coder) => coder,
                None => abort!(f, "Must specify coder for u32"),
            };
            if default.is_none() {
                default = Some(quote! {0});
            }
            Type::U32(coder)
        } else {
            if all_default {
                abort!(f, "all_default must be a bool");
            }
            if coder.is_some() {
                abort!(f, "Cannot specify coder for nested types");
            }
            if default.is_some() {
                abort!(f, "Cannot specify default for nested types");
            }
            let t = &f.ty;
            default = Some(quote! {<#t>::new()});
            Type::Nested
        };

        let name = match &f.ident {
            Some(ident) => ident.clone(),
            None => abort!(f, "only named fields are supported"),
        };
        let default = default.unwrap_or_default();

        Field {
            name,
            condition,
            default,
            ty,
            skip,
            all_default,
        }
    }

    fn is_coded(&self) -> bool {
        !self.skip && !self.all_default
    }

    fn visit_command(&self) -> TokenStream2 {
        let ident = &self.name;
        let default = &self.default;
        match &self.ty {
            Type::Nested => quote! { visitor.visit(&mut self.#ident)?; },
            Type::Bool => {
                quote! { visitor.bool(stringify!(#ident), #default, &mut self.#ident)?; }
            }
            Type::U32(coder) => {
                quote! { visitor.u32(stringify!(#ident), &#coder, #default, &mut self.#ident)?; }
            }
        }
    }

    // Produce visiting code for this field. `coded` are the fields that an
    // all-default marker resets.
    fn visit_fun(&self, coded: &[&Field]) -> TokenStream2 {
        let ident = &self.name;
        let default = &self.default;
        if self.skip {
            return quote! {};
        }
        if self.all_default {
            let resets = coded.iter().map(|f| {
                let ident = &f.name;
                let default = &f.default;
                quote! { self.#ident = #default; }
            });
            return quote! {
                let mut all_default =
                    !visitor.is_reading() && crate::fields::Fields::is_default(self);
                visitor.bool(stringify!(#ident), true, &mut all_default)?;
                self.#ident = all_default;
                if all_default {
                    if visitor.is_reading() {
                        #(#resets)*
                    }
                    return Ok(());
                }
            };
        }
        let command = self.visit_command();
        if let Some(cond) = &self.condition {
            quote! {
                if #cond {
                    #command
                } else if visitor.is_reading() {
                    self.#ident = #default;
                }
            }
        } else {
            command
        }
    }

    fn is_default_fun(&self) -> TokenStream2 {
        let ident = &self.name;
        let default = &self.default;
        match &self.ty {
            Type::Nested => quote! { crate::fields::Fields::is_default(&self.#ident) },
            _ => quote! { self.#ident == #default },
        }
    }

    fn init_fun(&self) -> TokenStream2 {
        let default = &self.default;
        let ident = &self.name;
        quote! {#ident : #default}
    }
}

fn derive_struct(input: DeriveInput) -> TokenStream2 {
    let name = &input.ident;

    let data = if let syn::Data::Struct(struct_data) = &input.data {
        struct_data
    } else {
        abort!(input, "derive_struct didn't get a struct");
    };

    let fields = if let syn::Fields::Named(syn::FieldsNamed {
        brace_token: _,
        named,
    }) = &data.fields
    {
        named
    } else {
        abort!(data.fields, "only named fields are supported (for now?)");
    };

    let fields: Vec<Field> = fields.iter().map(Field::parse).collect();
    if fields.iter().filter(|f| f.all_default).count() > 1 {
        abort!(input, "At most one all_default field is allowed");
    }
    let coded: Vec<&Field> = fields.iter().filter(|f| f.is_coded()).collect();
    let fields_visit = fields.iter().map(|f| f.visit_fun(&coded));
    let fields_is_default = coded.iter().map(|f| f.is_default_fun());
    let fields_init = fields.iter().map(Field::init_fun);

    quote! {
        impl #name {
            pub fn new() -> #name {
                #name {
                    #(#fields_init),*
                }
            }
        }
        impl ::core::default::Default for #name {
            fn default() -> #name {
                #name::new()
            }
        }
        impl crate::fields::Fields for #name {
            fn visit_fields<V: crate::fields::Visitor>(
                &mut self,
                visitor: &mut V,
            ) -> crate::error::Result<()> {
                #(#fields_visit)*
                Ok(())
            }
            fn is_default(&self) -> bool {
                true #(&& #fields_is_default)*
            }
        }
    }
}

#[proc_macro_error]
#[proc_macro_derive(Fields, attributes(coder, condition, default, skip, all_default))]
pub fn derive_fields(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match &input.data {
        syn::Data::Struct(_) => derive_struct(input).into(),
        _ => abort!(input, "Only implemented for struct"),
    }
}
