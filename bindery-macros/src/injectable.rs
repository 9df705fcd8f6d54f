mod attr;

use crate::injectable::attr::parse_field_attrs;

use proc_macro2::{Span, TokenStream};
use quote::{quote, quote_spanned};
use syn::{spanned::Spanned as _, Data, DeriveInput, Error, Fields, GenericArgument, Ident, PathArguments, Type};

/// How a field gets its value in the generated constructor.
enum FieldSource<'a> {
    /// Resolved as `Inject<T>`, the field takes the inner `Arc<T>`
    Shared(&'a Type),
    /// Resolved as the field type itself
    Resolver(&'a Type),
    Default,
}

/// `T` of a field typed `Arc<T>`, whatever the path to `Arc`.
fn arc_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Arc" {
        return None;
    }
    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };
    match arguments.args.first() {
        Some(GenericArgument::Type(inner)) if arguments.args.len() == 1 => Some(inner),
        _ => None,
    }
}

fn field_source(ty: &Type, skip: bool) -> FieldSource<'_> {
    if skip {
        FieldSource::Default
    } else if let Some(inner) = arc_inner(ty) {
        FieldSource::Shared(inner)
    } else {
        FieldSource::Resolver(ty)
    }
}

fn generate_entry(ident: &Ident) -> TokenStream {
    quote_spanned! { ident.span() =>
        const _: () = {
            #[::bindery::autowired::distributed_slice(::bindery::autowired::__AUTOWIRE_ENTRIES)]
            #[linkme(crate = ::bindery::autowired::linkme)]
            static __AUTOWIRE_ENTRY: fn() -> ::bindery::AutowireEntry = ::bindery::AutowireEntry::of::<#ident>;
        };
    }
}

pub(crate) fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(&input.generics, "#[derive(Injectable)] doesn't support generic types"));
    }
    let Data::Struct(data) = &input.data else {
        return Err(Error::new_spanned(&input.ident, "#[derive(Injectable)] can only be used on structs"));
    };
    let ident = &input.ident;

    let mut dependency_types = Vec::new();
    let mut dependency_names = Vec::new();
    let mut values = Vec::new();

    for (index, field) in data.fields.iter().enumerate() {
        let args = parse_field_attrs(&field.attrs)?;
        let span = field.ty.span();
        let name = Ident::new(&format!("__dependency{index}"), Span::call_site());

        let value = match field_source(&field.ty, args.skip.is_some()) {
            FieldSource::Shared(inner) => {
                dependency_types.push(quote_spanned! { span => ::bindery::Inject<#inner> });
                let value = quote! { #name.0 };
                dependency_names.push(name);
                value
            }
            FieldSource::Resolver(ty) => {
                dependency_types.push(quote_spanned! { span => #ty });
                let value = quote! { #name };
                dependency_names.push(name);
                value
            }
            FieldSource::Default => quote_spanned! { span => ::core::default::Default::default() },
        };
        values.push(value);
    }

    let construct = match &data.fields {
        Fields::Named(fields) => {
            let field_names = fields.named.iter().map(|field| field.ident.as_ref());
            quote! { Self { #( #field_names: #values, )* } }
        }
        Fields::Unnamed(_) => quote! { Self( #( #values, )* ) },
        Fields::Unit => quote! { Self },
    };
    let entry = generate_entry(ident);

    Ok(quote! {
        impl ::bindery::Injectable for #ident {
            type Deps = ( #( #dependency_types, )* );

            fn construct(( #( #dependency_names, )* ): Self::Deps) -> ::core::result::Result<Self, ::bindery::InstantiateErrorKind> {
                ::core::result::Result::Ok(#construct)
            }
        }

        #entry
    })
}
