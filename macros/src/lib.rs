use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, Ident, ItemFn, LitStr};

const USAGE: &str = "rxcombine_macro::test only accepts: #[rxcombine_macro::test], \
                     #[rxcombine_macro::test(current)] or #[rxcombine_macro::test(threaded)]";

/// Marks a test function.
///
/// Sync functions become plain `#[test]`s. Async functions run on a tokio
/// runtime: `current` (the default) uses a current-thread runtime, `threaded`
/// a multi-thread runtime so schedulers that hop threads can make progress.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
  let input = parse_macro_input!(item as ItemFn);
  let is_async = input.sig.asyncness.is_some();
  let raw_args = proc_macro2::TokenStream::from(attr);

  if !is_async {
    if !raw_args.is_empty() {
      return syn::Error::new(
        raw_args.span(),
        "runtime flavors are only supported for async tests, drop the argument or make the \
         function async",
      )
      .to_compile_error()
      .into();
    }
    return quote!(#[test] #input).into();
  }

  let flavor = if raw_args.is_empty() {
    "current"
  } else if let Ok(ident) = syn::parse2::<Ident>(raw_args.clone()) {
    match ident.to_string().as_str() {
      "current" => "current",
      "threaded" => "threaded",
      _ => return syn::Error::new(ident.span(), USAGE).to_compile_error().into(),
    }
  } else if let Ok(lit) = syn::parse2::<LitStr>(raw_args.clone()) {
    match lit.value().as_str() {
      "current" => "current",
      "threaded" => "threaded",
      _ => return syn::Error::new(lit.span(), USAGE).to_compile_error().into(),
    }
  } else {
    return syn::Error::new(raw_args.span(), USAGE).to_compile_error().into();
  };

  let runtime = if flavor == "threaded" {
    quote!(tokio::test(flavor = "multi_thread", worker_threads = 2))
  } else {
    quote!(tokio::test(flavor = "current_thread"))
  };

  quote!(#[#runtime] #input).into()
}
