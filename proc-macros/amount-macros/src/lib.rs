//! Compile-time construction of `common::amount::Amount` values from
//! numeric literals, e.g. `amount!(1.5)` or `amount!(100)`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Expr, Lit, LitFloat, LitInt};

fn expand_int(lit: LitInt) -> proc_macro2::TokenStream {
    match lit.base10_parse::<u128>() {
        Ok(0) => quote! { common::amount::Amount::ZERO },
        Ok(1) => quote! { common::amount::Amount::ONE },
        Ok(2) => quote! { common::amount::Amount::TWO },
        Ok(4) => quote! { common::amount::Amount::FOUR },
        Ok(_) => quote! {
            common::amount::Amount::from_u128_with_scale(#lit as u128, 0)
        },
        Err(e) => panic!("amount!: integer literal out of range for u128: {}", e),
    }
}

fn expand_float(lit: LitFloat) -> proc_macro2::TokenStream {
    let digits = lit.base10_digits();
    let (mantissa, scale) = match digits.split_once('.') {
        Some((whole, frac)) => (format!("{whole}{frac}"), frac.len()),
        None => (digits.to_string(), 0),
    };

    let mantissa: LitInt = match syn::parse_str(&mantissa) {
        Ok(lit) => lit,
        Err(e) => panic!("amount!: cannot parse float mantissa '{}': {}", mantissa, e),
    };

    quote! {
        common::amount::Amount::from_u128_with_scale(#mantissa as u128, #scale as u8)
    }
}

#[proc_macro]
pub fn amount(input: TokenStream) -> TokenStream {
    let mut expr = parse_macro_input!(input as Expr);

    if let Expr::Group(group) = expr {
        expr = *group.expr;
    }

    let lit = match expr {
        Expr::Lit(expr_lit) => expr_lit.lit,
        other => panic!("amount! only accepts a numeric literal, got: {:?}", other),
    };

    let expanded = match lit {
        Lit::Int(lit) => expand_int(lit),
        Lit::Float(lit) => expand_float(lit),
        other => panic!("amount! only accepts a numeric literal, got: {:?}", other),
    };

    expanded.into()
}
