use proc_macro2::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{Error, Expr, ItemFn, Lit, Meta, ReturnType, Token, Type};

/// Expands the `#[herald_runtime::main]` attribute macro.
///
/// Accepted arguments: an optional profile name followed by an optional
/// `worker_threads = N` override, e.g. `#[herald_runtime::main(memory_efficient, worker_threads = 2)]`.
pub fn expand_main(args: TokenStream, input: ItemFn) -> TokenStream {
    match expand(args, &input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn expand(args: TokenStream, input: &ItemFn) -> syn::Result<TokenStream> {
    if input.sig.asyncness.is_none() {
        return Err(Error::new_spanned(
            &input.sig.ident,
            "#[herald_runtime::main] can only be used on async functions",
        ));
    }
    if !returns_result(&input.sig.output) {
        return Err(Error::new_spanned(
            &input.sig.output,
            "#[herald_runtime::main] requires a Result return type",
        ));
    }

    let config = runtime_config(args)?;
    let ItemFn { attrs, vis, sig, block } = input;
    let name = &sig.ident;
    let output = &sig.output;

    Ok(quote! {
        #(#attrs)*
        #vis fn #name() #output {
            let config = #config;
            let runtime = ::herald_runtime::build_runtime_with_config(&config)?;
            runtime.block_on(async #block)
        }
    })
}

fn runtime_config(args: TokenStream) -> syn::Result<TokenStream> {
    let metas = syn::parse::Parser::parse2(Punctuated::<Meta, Token![,]>::parse_terminated, args)?;

    let mut profile = None;
    let mut worker_threads = None;
    for meta in metas {
        match meta {
            Meta::Path(path) if profile.is_none() => {
                let ident = path.require_ident()?;
                profile = Some(match ident.to_string().as_str() {
                    "high_performance" => quote! { high_performance() },
                    "memory_efficient" => quote! { memory_efficient() },
                    "default" => quote! { default() },
                    _ => {
                        return Err(Error::new_spanned(
                            ident,
                            "unknown runtime profile, expected high_performance, memory_efficient or default",
                        ));
                    },
                });
            },
            Meta::NameValue(nv) if nv.path.is_ident("worker_threads") && worker_threads.is_none() => {
                let Expr::Lit(syn::ExprLit { lit: Lit::Int(threads), .. }) = &nv.value else {
                    return Err(Error::new_spanned(&nv.value, "worker_threads expects an integer literal"));
                };
                let threads: usize = threads.base10_parse()?;
                worker_threads = Some(quote! { .with_worker_threads(#threads) });
            },
            other => return Err(Error::new_spanned(other, "unexpected runtime argument")),
        }
    }

    let profile = profile.unwrap_or_else(|| quote! { default() });
    Ok(quote! { ::herald_runtime::RuntimeConfig::#profile #worker_threads })
}

fn returns_result(output: &ReturnType) -> bool {
    let ReturnType::Type(_, ty) = output else {
        return false;
    };
    let Type::Path(path) = &**ty else {
        return false;
    };
    path.path.segments.last().is_some_and(|seg| seg.ident == "Result")
}
