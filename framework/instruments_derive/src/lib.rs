use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn, LitStr};

/// Time an async client method and report it as an operation.
///
/// The method must take `self` by reference, return a `Result` and belong to a type implementing
/// `gust_instruments::Instrumented`. The operation id is the method name with an optional prefix:
///
/// ```ignore
/// #[gust_instrument(prefix = "http_")]
/// pub async fn get(&self, url: &str) -> Result<HttpResponse, HttpClientError> { .. }
/// ```
///
/// records operations named `http_get`. An `Err` result marks the operation as failed.
#[proc_macro_attribute]
pub fn gust_instrument(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut prefix = String::new();
    let args_parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("prefix") {
            prefix = meta.value()?.parse::<LitStr>()?.value();
            Ok(())
        } else {
            Err(meta.error("unsupported gust_instrument property"))
        }
    });
    parse_macro_input!(args with args_parser);

    let mut input = parse_macro_input!(input as ItemFn);
    if input.sig.asyncness.is_none() {
        return syn::Error::new_spanned(
            input.sig.fn_token,
            "gust_instrument can only be applied to async functions",
        )
        .to_compile_error()
        .into();
    }

    let operation_id = format!("{prefix}{}", input.sig.ident);
    let body = &input.block;
    input.block = Box::new(syn::parse_quote! {{
        let __gust_record =
            ::gust_instruments::Instrumented::start_operation(self, #operation_id);
        let __gust_result = async #body.await;
        ::gust_instruments::Instrumented::finish_operation(self, __gust_record, &__gust_result);
        __gust_result
    }});

    TokenStream::from(quote!(#input))
}
