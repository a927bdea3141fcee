extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, parse_quote, Attribute, Data, DeriveInput, Fields, GenericArgument, Generics,
    Index, Member, PathArguments, Type,
};

/// Type attributes parsed from `#[senax(...)]` annotations
///
/// # Supported Attributes
///
/// * `#[senax(map_by_slice)]` - Encode the wrapped `Vec<T>` as a map of alternating keys and
///   values
#[derive(Debug, Clone, Default)]
struct TypeAttributes {
    map_by_slice: bool,
}

fn get_type_attributes(attrs: &[Attribute]) -> syn::Result<TypeAttributes> {
    let mut parsed = TypeAttributes::default();
    for attr in attrs {
        if !attr.path().is_ident("senax") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("map_by_slice") {
                parsed.map_by_slice = true;
                Ok(())
            } else {
                Err(meta.error("Unknown senax attribute; expected `map_by_slice`"))
            }
        })?;
    }
    Ok(parsed)
}

/// The single field wrapped by a newtype.
struct Newtype<'a> {
    member: Member,
    ty: &'a Type,
}

fn newtype_field(input: &DeriveInput) -> syn::Result<Newtype<'_>> {
    let error = || {
        syn::Error::new_spanned(
            &input.ident,
            "senax-codec derives are only supported on structs with exactly one field",
        )
    };
    let Data::Struct(data) = &input.data else {
        return Err(error());
    };
    match &data.fields {
        Fields::Named(fields) if fields.named.len() == 1 => {
            let field = &fields.named[0];
            let ident = field.ident.clone().ok_or_else(error)?;
            Ok(Newtype {
                member: Member::Named(ident),
                ty: &field.ty,
            })
        }
        Fields::Unnamed(fields) if fields.unnamed.len() == 1 => Ok(Newtype {
            member: Member::Unnamed(Index::from(0)),
            ty: &fields.unnamed[0].ty,
        }),
        _ => Err(error()),
    }
}

/// Extract the element type `T` from `Vec<T>`
fn extract_inner_type_from_vec(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Vec" {
        return None;
    }
    if let PathArguments::AngleBracketed(args) = &segment.arguments {
        if let Some(GenericArgument::Type(inner_ty)) = args.args.first() {
            return Some(inner_ty);
        }
    }
    None
}

fn map_by_slice_element<'a>(newtype: &Newtype<'a>) -> syn::Result<&'a Type> {
    extract_inner_type_from_vec(newtype.ty).ok_or_else(|| {
        syn::Error::new_spanned(
            newtype.ty,
            "#[senax(map_by_slice)] requires the wrapped field to be a Vec<T>",
        )
    })
}

/// Clones `generics` and adds `bounded: bound` to the where clause.
fn with_bound(generics: &Generics, bounded: &Type, bound: TokenStream2) -> Generics {
    let mut generics = generics.clone();
    generics
        .make_where_clause()
        .predicates
        .push(parse_quote!(#bounded: #bound));
    generics
}

/// Derive macro for implementing the `Encoder` and `Classify` traits
///
/// Supported on single-field newtypes. Without attributes, the newtype is classified and encoded
/// exactly like its field. With `#[senax(map_by_slice)]` on a newtype over `Vec<T>`, it also
/// implements `MapBySlice` and is encoded as a map of alternating keys and values.
///
/// # Examples
///
/// ```rust,ignore
/// #[derive(Encode)]
/// struct UserIds(Vec<u64>);
///
/// #[derive(Encode)]
/// #[senax(map_by_slice)]
/// struct Headers(Vec<String>);
/// ```
#[proc_macro_derive(Encode, attributes(senax))]
pub fn derive_encode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_encode(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_encode(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let attrs = get_type_attributes(&input.attrs)?;
    let newtype = newtype_field(input)?;
    let name = &input.ident;
    let member = &newtype.member;

    if !attrs.map_by_slice {
        let ty = newtype.ty;
        let classify_generics = with_bound(&input.generics, ty, quote!(senax_codec::Classify));
        let (impl_generics, ty_generics, where_clause) = classify_generics.split_for_impl();
        let classify = quote! {
            impl #impl_generics senax_codec::Classify for #name #ty_generics #where_clause {
                fn classify() -> senax_codec::Kind {
                    <#ty as senax_codec::Classify>::classify()
                }
            }
        };

        let encode_generics = with_bound(&input.generics, ty, quote!(senax_codec::Encoder));
        let (impl_generics, ty_generics, where_clause) = encode_generics.split_for_impl();
        return Ok(quote! {
            #classify

            impl #impl_generics senax_codec::Encoder for #name #ty_generics #where_clause {
                fn encode(
                    &self,
                    writer: &mut senax_codec::bytes::BytesMut,
                    handle: &senax_codec::Handle,
                ) -> senax_codec::Result<()> {
                    senax_codec::Encoder::encode(&self.#member, writer, handle)
                }
            }
        });
    }

    let elem = map_by_slice_element(&newtype)?;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let map_by_slice = quote! {
        impl #impl_generics senax_codec::MapBySlice for #name #ty_generics #where_clause {
            type Item = #elem;

            fn items(&self) -> &[#elem] {
                &self.#member
            }

            fn items_mut(&mut self) -> &mut ::std::vec::Vec<#elem> {
                &mut self.#member
            }
        }
    };

    let classify_generics = with_bound(&input.generics, elem, quote!(senax_codec::Classify));
    let (impl_generics, ty_generics, where_clause) = classify_generics.split_for_impl();
    let classify = quote! {
        impl #impl_generics senax_codec::Classify for #name #ty_generics #where_clause {
            fn classify() -> senax_codec::Kind {
                senax_codec::Kind::map_by_slice(<#elem as senax_codec::Classify>::classify())
            }
        }
    };

    let encode_generics = with_bound(&input.generics, elem, quote!(senax_codec::Encoder));
    let (impl_generics, ty_generics, where_clause) = encode_generics.split_for_impl();
    Ok(quote! {
        #map_by_slice

        #classify

        impl #impl_generics senax_codec::Encoder for #name #ty_generics #where_clause {
            fn encode(
                &self,
                writer: &mut senax_codec::bytes::BytesMut,
                handle: &senax_codec::Handle,
            ) -> senax_codec::Result<()> {
                senax_codec::container::encode_map_by_slice(self, writer, handle)
            }
        }
    })
}

/// Derive macro for implementing the `Decoder` trait
///
/// Must be combined with `#[derive(Encode)]`, which provides the `Classify` implementation
/// `Decoder` builds on. Accepts the same `#[senax(map_by_slice)]` attribute; such a type decodes
/// from a map payload (flattened in wire order) or from a plain sequence payload.
///
/// # Examples
///
/// ```rust,ignore
/// #[derive(Encode, Decode)]
/// #[senax(map_by_slice)]
/// struct Headers(Vec<String>);
/// ```
#[proc_macro_derive(Decode, attributes(senax))]
pub fn derive_decode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_decode(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_decode(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let attrs = get_type_attributes(&input.attrs)?;
    let newtype = newtype_field(input)?;
    let name = &input.ident;
    let member = &newtype.member;

    if !attrs.map_by_slice {
        let ty = newtype.ty;
        let generics = with_bound(&input.generics, ty, quote!(senax_codec::Decoder));
        let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
        return Ok(quote! {
            impl #impl_generics senax_codec::Decoder for #name #ty_generics #where_clause {
                fn decode(
                    reader: &mut senax_codec::bytes::Bytes,
                    handle: &senax_codec::Handle,
                ) -> senax_codec::Result<Self> {
                    Ok(Self {
                        #member: <#ty as senax_codec::Decoder>::decode(reader, handle)?,
                    })
                }

                fn decode_into(
                    &mut self,
                    reader: &mut senax_codec::bytes::Bytes,
                    handle: &senax_codec::Handle,
                ) -> senax_codec::Result<()> {
                    senax_codec::Decoder::decode_into(&mut self.#member, reader, handle)
                }

                fn decode_in_place(
                    &mut self,
                    reader: &mut senax_codec::bytes::Bytes,
                    handle: &senax_codec::Handle,
                ) -> senax_codec::Result<()> {
                    senax_codec::Decoder::decode_in_place(&mut self.#member, reader, handle)
                }
            }
        });
    }

    let elem = map_by_slice_element(&newtype)?;
    let generics = with_bound(&input.generics, elem, quote!(senax_codec::Decoder + 'static));
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics senax_codec::Decoder for #name #ty_generics #where_clause {
            fn decode(
                reader: &mut senax_codec::bytes::Bytes,
                handle: &senax_codec::Handle,
            ) -> senax_codec::Result<Self> {
                let mut value = Self {
                    #member: ::std::vec::Vec::new(),
                };
                senax_codec::container::decode_map_by_slice(
                    &mut value,
                    senax_codec::DecodeTarget::Nil,
                    reader,
                    handle,
                )?;
                Ok(value)
            }

            fn decode_into(
                &mut self,
                reader: &mut senax_codec::bytes::Bytes,
                handle: &senax_codec::Handle,
            ) -> senax_codec::Result<()> {
                let target = senax_codec::DecodeTarget::of_vec(&self.#member);
                senax_codec::container::decode_map_by_slice(self, target, reader, handle)
            }

            fn decode_in_place(
                &mut self,
                reader: &mut senax_codec::bytes::Bytes,
                handle: &senax_codec::Handle,
            ) -> senax_codec::Result<()> {
                let target = senax_codec::DecodeTarget::NonAddressable {
                    len: self.#member.len(),
                };
                senax_codec::container::decode_map_by_slice(self, target, reader, handle)
            }
        }
    })
}
