use core::any;
use quote::ToTokens;
use syn::parse::{Parse, ParseStream};

fn keyword_name<K>() -> &'static str {
    let name = any::type_name::<K>();
    name.rsplit("::").next().unwrap_or(name)
}

pub(crate) fn parse_flag_attribute<K>(input: ParseStream<'_>, out: &mut Option<K>) -> syn::Result<()>
where
    K: Parse + ToTokens,
{
    let kw = input.parse::<K>()?;

    if out.is_some() {
        let msg = "` specified more than once";
        return Err(syn::Error::new_spanned(kw, ["`", keyword_name::<K>(), msg].concat()));
    }

    *out = Some(kw);

    Ok(())
}

pub(crate) trait Combine: Sized {
    fn combine(self, other: Self) -> syn::Result<Self>;
}

pub(crate) fn parse_attrs<T>(ident: &str, attrs: &[syn::Attribute]) -> Option<Result<T, (syn::Error, syn::Attribute)>>
where
    T: Combine + Parse,
{
    let mut iter = attrs
        .iter()
        .filter(|attr| attr.meta.path().is_ident(ident))
        .map(|attr| (attr, attr.parse_args::<T>()));

    let first = match iter.next() {
        Some((_, Ok(first))) => first,
        Some((attr, Err(err))) => return Some(Err((err, attr.clone()))),
        None => return None,
    };

    let result = iter.try_fold(first, |out, (attr, next_result)| match next_result {
        Ok(next) => out.combine(next).map_err(|err| (err, attr.clone())),
        Err(err) => Err((err, attr.clone())),
    });

    Some(result)
}

pub(crate) fn combine_flag<K>(a: &mut Option<K>, b: Option<K>) -> syn::Result<()>
where
    K: ToTokens,
{
    if let Some(kw) = b {
        if a.is_some() {
            let msg = "` specified more than once";
            return Err(syn::Error::new_spanned(kw, ["`", keyword_name::<K>(), msg].concat()));
        }
        *a = Some(kw);
    }
    Ok(())
}
