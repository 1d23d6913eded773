//! Text folding shared by status parsing, collation and column matching.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Decomposes `input` and drops combining marks: `"Não"` becomes `"Nao"`.
pub fn strip_diacritics(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Folds free text into a comparable token: no accents, lowercase, runs of
/// non-alphanumerics collapsed to a single `_`, no leading/trailing `_`.
///
/// `"Não Regularizado"`, `"nao_regularizado"` and `" NÃO-REGULARIZADO "` all
/// fold to `"nao_regularizado"`.
pub fn fold_token(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_sep = false;
    for c in strip_diacritics(input).chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_portuguese_accents() {
        assert_eq!(strip_diacritics("Não Conformidade ção"), "Nao Conformidade cao");
    }

    #[test]
    fn folds_tokens() {
        assert_eq!(fold_token("Não Regularizado"), "nao_regularizado");
        assert_eq!(fold_token(" NÃO-REGULARIZADO "), "nao_regularizado");
        assert_eq!(fold_token("not_regularized"), "not_regularized");
        assert_eq!(fold_token("Nº"), "nº");
        assert_eq!(fold_token("--"), "");
    }
}
