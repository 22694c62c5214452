#![doc = include_str!("../README.md")]

//! Implementation notes
//!
//! The exported `#[proc_macro_derive]` only converts between `proc_macro`
//! and `proc_macro2` token streams; all real work happens in `expand`,
//! which operates purely on `syn`/`proc_macro2` types so it can be unit
//! tested directly without going through an actual macro invocation.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Expr, Fields, Lit, Meta, Type};

#[proc_macro_derive(TickRecord, attributes(tick))]
pub fn derive_tick_record(input: TokenStream) -> TokenStream {
  let ast = syn::parse_macro_input!(input as DeriveInput);
  expand(ast)
    .unwrap_or_else(syn::Error::into_compile_error)
    .into()
}

fn expand(ast: DeriveInput) -> syn::Result<TokenStream2> {
  let name = &ast.ident;
  let data = match &ast.data {
    Data::Struct(data) => data,
    _ => {
      return Err(syn::Error::new_spanned(
        &ast,
        "#[derive(TickRecord)] only supports structs",
      ))
    }
  };
  let fields = match &data.fields {
    Fields::Named(fields) => &fields.named,
    _ => {
      return Err(syn::Error::new_spanned(
        &ast,
        "#[derive(TickRecord)] requires a struct with named fields",
      ))
    }
  };

  let mut field_exprs = Vec::with_capacity(fields.len());
  for (index, field) in fields.iter().enumerate() {
    let ident = field
      .ident
      .as_ref()
      .expect("Fields::Named guarantees an ident");
    let field_name = ident.to_string();
    let index = index as u32;
    let (type_variant, natural_compression) = field_type_of(&field.ty)?;
    let compression = compression_for_field(&field.attrs, natural_compression)?;

    field_exprs.push(quote! {
      ::tickfile::schema::FieldSpec {
        index: #index,
        ty: ::tickfile::schema::FieldType::#type_variant,
        offset: ::core::mem::offset_of!(#name, #ident) as u32,
        name: #field_name.to_string(),
        compression: ::tickfile::schema::CompressionKind::#compression,
      }
    });
  }

  let type_name = name.to_string();
  Ok(quote! {
    impl ::tickfile::schema::TickRecord for #name {
      fn item_section() -> ::tickfile::schema::ItemSection {
        ::tickfile::schema::ItemSection {
          item_size: ::core::mem::size_of::<#name>() as u32,
          type_name: #type_name.to_string(),
          fields: vec![#(#field_exprs),*],
        }
      }
    }
  })
}

/// Maps a field's Rust type to its `FieldType` variant and the compression
/// kind that type defaults to absent a `#[tick(compression = "...")]`
/// override.
fn field_type_of(ty: &Type) -> syn::Result<(TokenStream2, &'static str)> {
  if let Type::Path(path) = ty {
    if let Some(ident) = path.path.get_ident() {
      let variant = match ident.to_string().as_str() {
        "i8" => "I8",
        "i16" => "I16",
        "i32" => "I32",
        "i64" => "I64",
        "u8" => "U8",
        "u16" => "U16",
        "u32" => "U32",
        "u64" => "U64",
        "f32" => "F32",
        "f64" => "F64",
        other => {
          return Err(syn::Error::new_spanned(
            ty,
            format!("unsupported field type `{}`; expected a fixed-width integer, f32/f64, or a [u8; 32]/[u8; 256] array", other),
          ))
        }
      };
      let variant = syn::Ident::new(variant, proc_macro2::Span::call_site());
      return Ok((quote! { #variant }, natural_compression_name(&variant.to_string())));
    }
  }
  if let Type::Array(array) = ty {
    let is_u8 = matches!(&*array.elem, Type::Path(p) if p.path.is_ident("u8"));
    if !is_u8 {
      return Err(syn::Error::new_spanned(
        ty,
        "array fields must have element type u8",
      ));
    }
    let len = match &array.len {
      Expr::Lit(lit) => match &lit.lit {
        Lit::Int(int) => int.base10_parse::<u64>()?,
        _ => {
          return Err(syn::Error::new_spanned(
            &array.len,
            "array length must be an integer literal",
          ))
        }
      },
      _ => {
        return Err(syn::Error::new_spanned(
          &array.len,
          "array length must be a literal, not a const expression",
        ))
      }
    };
    let variant = match len {
      32 => "Array32",
      256 => "Array256",
      other => {
        return Err(syn::Error::new_spanned(
          ty,
          format!("unsupported array length {}; only [u8; 32] and [u8; 256] are supported", other),
        ))
      }
    };
    let variant = syn::Ident::new(variant, proc_macro2::Span::call_site());
    return Ok((quote! { #variant }, natural_compression_name(&variant.to_string())));
  }
  Err(syn::Error::new_spanned(
    ty,
    "unsupported field type; expected a fixed-width integer, f32/f64, or a [u8; 32]/[u8; 256] array",
  ))
}

fn natural_compression_name(field_type_variant: &str) -> &'static str {
  match field_type_variant {
    "I8" | "U8" => "Gorilla8",
    "I16" | "U16" => "Gorilla16",
    "I32" | "U32" | "F32" => "Gorilla32",
    "I64" | "U64" | "F64" => "Gorilla64",
    "Array32" => "RunLengthBytes32",
    "Array256" => "RunLengthBytes256",
    other => unreachable!("field_type_of never returns variant `{}`", other),
  }
}

/// Reads an optional `#[tick(compression = "...")]` attribute off a field,
/// falling back to `natural` when absent. Recognized names: `none`,
/// `gorilla8`, `gorilla16`, `gorilla32`, `gorilla64`, `run_length`.
fn compression_for_field(attrs: &[syn::Attribute], natural: &'static str) -> syn::Result<TokenStream2> {
  for attr in attrs {
    if !attr.path().is_ident("tick") {
      continue;
    }
    let mut override_name = None;
    attr.parse_nested_meta(|meta| {
      if meta.path.is_ident("compression") {
        let value = meta.value()?;
        let lit: Lit = value.parse()?;
        let s = match lit {
          Lit::Str(s) => s.value(),
          _ => return Err(meta.error("compression value must be a string literal")),
        };
        override_name = Some(s);
        Ok(())
      } else {
        Err(meta.error("unrecognized key in #[tick(...)]; expected `compression`"))
      }
    })?;
    if let Some(name) = override_name {
      let variant = match name.as_str() {
        "none" => "None",
        "gorilla8" => "Gorilla8",
        "gorilla16" => "Gorilla16",
        "gorilla32" => "Gorilla32",
        "gorilla64" => "Gorilla64",
        "run_length" => {
          // The caller picks which width based on the field's array length;
          // `natural` already resolved that for us.
          if natural == "RunLengthBytes32" || natural == "RunLengthBytes256" {
            natural
          } else {
            return Err(syn::Error::new_spanned(
              &attr.meta,
              "`run_length` compression only applies to [u8; 32]/[u8; 256] array fields",
            ));
          }
        }
        other => {
          return Err(syn::Error::new_spanned(
            &attr.meta,
            format!("unknown compression `{}`; expected one of: none, gorilla8, gorilla16, gorilla32, gorilla64, run_length", other),
          ))
        }
      };
      let variant = syn::Ident::new(variant, proc_macro2::Span::call_site());
      return Ok(quote! { #variant });
    }
  }
  let variant = syn::Ident::new(natural, proc_macro2::Span::call_site());
  Ok(quote! { #variant })
}
