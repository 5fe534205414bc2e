// src/cpf.rs

pub const CPF_DIGITS: usize = 11;
pub const CPF_FORMATTED_LEN: usize = 14;

/// Formats CPF input as it is typed: non-digits are dropped and the
/// `NNN.NNN.NNN-NN` separators appear once the following digit exists.
/// Extra digits past the eleventh are discarded.
pub fn format_cpf(input: &str) -> String {
    let digits: Vec<char> = input
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(CPF_DIGITS)
        .collect();

    let mut formatted = String::with_capacity(CPF_FORMATTED_LEN);
    for (i, digit) in digits.iter().enumerate() {
        match i {
            3 | 6 => formatted.push('.'),
            9 => formatted.push('-'),
            _ => {}
        }
        formatted.push(*digit);
    }
    formatted
}
