use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Signature, Type};

/// Transform an asynchronous test into a synchronous one running on its own
/// runtime, with test logging enabled and dependencies injected.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`] (a
/// client for a server built around the in-memory store), `&MemoryStore` and
/// `&Outbox` (the store and notifier that server uses).
///
/// `#[backend_test(seeded)]` loads the example slate for next year, so that
/// voting is open, before the test runs.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract the arguments to inject and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Seed the store if requested.
    let store = match parse_macro_input!(args as Option<Ident>) {
        None => quote! { crate::store::MemoryStore::new() },
        Some(arg) if arg == "seeded" => quote! {
            crate::store::MemoryStore::with_example_slate(
                chrono::Datelike::year(&chrono::Utc::now()) + 1,
            )
            .await
        },
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `seeded` or no argument")
                .into_compile_error()
                .into();
        }
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// The test itself.
            #item_fn

            log4rs_test_utils::test_logging::init_logging_once_for(
                ["fansaward_backend"],
                None,
                None,
            );

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let store = std::sync::Arc::new(#store);
                let outbox = std::sync::Arc::new(crate::notify::Outbox::new());
                let config = crate::config::Config::new(
                    "https://fansaward.test",
                    crate::tally::LIVE_RESULTS_LIMIT,
                );
                let rocket = crate::build_with(store.clone(), outbox.clone(), config);
                let rocket_client = rocket::local::asynchronous::Client::tracked(rocket)
                    .await
                    .unwrap();

                #new_name(#(#test_args),*).await;
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, map its parameters to injected values,
/// and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut args = vec![];
    let mut seen = vec![];

    for input in &sig.inputs {
        let injected = match input {
            FnArg::Typed(pat_type) => match &*pat_type.ty {
                Type::Path(type_path) if type_path.path.is_ident("Client") => {
                    Some(("Client", quote! { rocket_client }))
                }
                Type::Reference(reference) => match &*reference.elem {
                    Type::Path(type_path) if type_path.path.is_ident("MemoryStore") => {
                        Some(("MemoryStore", quote! { &store }))
                    }
                    Type::Path(type_path) if type_path.path.is_ident("Outbox") => {
                        Some(("Outbox", quote! { &outbox }))
                    }
                    _ => None,
                },
                _ => None,
            },
            FnArg::Receiver(_) => None,
        };

        match injected {
            Some((kind, _)) if seen.contains(&kind) => {
                return Err(syn::Error::new(
                    input.span(),
                    format!("Test cannot accept more than one `{kind}`"),
                ));
            }
            Some((kind, arg)) => {
                seen.push(kind);
                args.push(arg);
            }
            None => {
                return Err(syn::Error::new(
                    input.span(),
                    "Expected one of `client: Client`, `store: &MemoryStore` or `outbox: &Outbox`",
                ));
            }
        }
    }

    Ok(args)
}
