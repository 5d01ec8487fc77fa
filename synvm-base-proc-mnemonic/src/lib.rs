use proc_macro::{Literal, TokenStream, TokenTree};

/// Expands an opcode variant name to its mnemonic: the identifier in lowercase,
/// as a string literal. Anything but a single identifier is a compile error.
///
/// # Example
/// ```
/// # use synvm_base_proc_mnemonic::mnemonic;
/// assert_eq!(mnemonic!(Rmem), "rmem");
/// assert_eq!(mnemonic!(Noop), "noop");
/// ```
#[proc_macro]
pub fn mnemonic(stream: TokenStream) -> TokenStream {
    let mut tokens = stream.into_iter();

    match (tokens.next(), tokens.next()) {
        (Some(TokenTree::Ident(ident)), None) => {
            let name = ident.to_string().to_lowercase();
            TokenTree::Literal(Literal::string(&name)).into()
        }
        _ => "compile_error!(\"mnemonic! expects a single identifier\")"
            .parse()
            .unwrap_or_default(),
    }
}
