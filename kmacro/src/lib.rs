//! Macro definitions for kernel module functions.
use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{
    Ident, LitByteStr, LitStr, Token,
    parse::{Parse, ParseStream},
    parse_macro_input,
};

/// Longest module name that still fits `module::name` with its NUL.
const MODULE_NAME_MAX: usize = 55;

/// Attribute macro to mark the initialization function of a kernel module. It
/// places the function in the `.text.init` section.
///
/// The function may return a raw `i32` status or a `kmod::Result<()>`; an
/// error is handed to the host as a negative errno.
/// # Example:
/// ```ignore
/// #[init_fn]
/// fn init() -> kmod::Result { ... }
/// ```
#[proc_macro_attribute]
pub fn init_fn(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as syn::ItemFn);
    let func_name = &func.sig.ident;
    quote! {
        unsafe extern "C" fn init_module() -> core::ffi::c_int {
            kmod::error::InitReturn::into_status(#func_name())
        }
        #[unsafe(link_section = ".text.init")]
        #func
    }
    .into()
}

/// Attribute macro to mark the cleanup function of a kernel module. It places
/// the function in the `.text.exit` section.
/// # Example:
/// ```ignore
/// #[exit_fn]
/// fn cleanup() { ... }
/// ```
#[proc_macro_attribute]
pub fn exit_fn(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as syn::ItemFn);
    let func_name = &func.sig.ident;
    quote! {
        unsafe extern "C" fn cleanup_module() {
            #func_name()
        }
        #[unsafe(link_section = ".text.exit")]
        #func
    }
    .into()
}

/// Exports a host function to modules under its unmangled symbol name.
///
/// Only `extern "C"` functions can cross the module boundary.
/// # Example:
/// ```ignore
/// #[capi_fn]
/// pub unsafe extern "C" fn vfree(addr: *const c_void) { ... }
/// ```
#[proc_macro_attribute]
pub fn capi_fn(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as syn::ItemFn);
    let is_c_abi = func
        .sig
        .abi
        .as_ref()
        .and_then(|abi| abi.name.as_ref())
        .is_some_and(|name| name.value() == "C");
    if !is_c_abi {
        return syn::Error::new_spanned(&func.sig, "capi_fn requires an `extern \"C\"` function")
            .to_compile_error()
            .into();
    }
    quote! {
        #[unsafe(no_mangle)]
        #func
    }
    .into()
}

const MODINFO_KEYS: &[&str] = &["name", "version", "license", "description", "author"];

struct ModuleArgs {
    entries: Vec<(Ident, LitStr)>,
}

impl ModuleArgs {
    fn get(&self, key: &str) -> Option<&LitStr> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

impl Parse for ModuleArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut entries: Vec<(Ident, LitStr)> = Vec::new();
        while !input.is_empty() {
            let key: Ident = input.parse()?;
            input.parse::<Token![:]>()?;
            let value: LitStr = input.parse()?;

            let key_str = key.to_string();
            if !MODINFO_KEYS.contains(&key_str.as_str()) {
                return Err(syn::Error::new(
                    key.span(),
                    format!("Unknown field: {}", key),
                ));
            }
            if entries.iter().any(|(k, _)| *k == key_str) {
                return Err(syn::Error::new(
                    key.span(),
                    format!("Duplicated field: {}", key),
                ));
            }
            entries.push((key, value));

            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        let args = ModuleArgs { entries };
        for required in ["name", "license"] {
            if args.get(required).is_none() {
                return Err(input.error(format!("{} is required", required)));
            }
        }
        Ok(args)
    }
}

/// Macro to declare module metadata in the `.modinfo` section and the
/// `__this_module` record the host uses to run the init and exit hooks.
///
/// `name` and `license` are required, `version`, `description` and
/// `author` are optional. The hooks come from [`init_fn`] and [`exit_fn`].
///
/// # Example:
/// ```ignore
/// module! {
///     name: "hello",
///     version: "1.0.0",
///     license: "GPL",
///     description: "A simple hello world kernel module",
/// }
/// ```
///
/// Parameters can be in any order, for example:
/// ```ignore
/// module! {
///     name: "hello",
///     author: "Someone",
///     license: "GPL",
/// }
/// ```
#[proc_macro]
pub fn module(item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(item as ModuleArgs);

    let name = match args.get("name") {
        Some(name) => name,
        None => unreachable!("checked while parsing"),
    };
    let name_value = name.value();
    if name_value.is_empty() || name_value.len() > MODULE_NAME_MAX || name_value.contains('\0') {
        return syn::Error::new(
            name.span(),
            format!("module name must be 1..={} bytes without NUL", MODULE_NAME_MAX),
        )
        .to_compile_error()
        .into();
    }
    let name_bytes = LitByteStr::new(name_value.as_bytes(), name.span());

    // Each modinfo entry is a `key=value\0` byte array
    let modinfo = args.entries.iter().map(|(key, value)| {
        let mut entry = format!("{}=", key).into_bytes();
        entry.extend_from_slice(value.value().as_bytes());
        entry.push(0);
        let len = entry.len();
        let ident = format_ident!("__MODINFO_{}", key.to_string().to_uppercase());
        quote! {
            #[used]
            #[unsafe(link_section = ".modinfo")]
            static #ident: [u8; #len] = [#(#entry),*];
        }
    });

    quote! {
        #(#modinfo)*

        #[used]
        #[unsafe(link_section = ".gnu.linkonce.this_module")]
        #[allow(non_upper_case_globals)]
        pub static __this_module: kmod::Module =
            kmod::Module::new(#name_bytes, Some(init_module), Some(cleanup_module));

        #[cfg(target_os = "none")]
        #[panic_handler]
        fn panic(_info: &core::panic::PanicInfo) -> ! {
            loop {}
        }
    }
    .into()
}
