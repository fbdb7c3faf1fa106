//! German IBAN and BIC handling.
//!
//! A German IBAN is `DE`, two check digits, an 8-digit bank code (BLZ) and a 10-digit
//! account number. Check digits follow ISO 7064 mod 97-10.

use serde::Serialize;
use thiserror::Error;

use super::bank_directory;

pub const COUNTRY_CODE: &str = "DE";
pub const IBAN_LEN: usize = 22;
pub const BANK_CODE_LEN: usize = 8;
pub const ACCOUNT_NUMBER_LEN: usize = 10;

/// `D` = 13 and `E` = 14 in the IBAN letter-to-number table.
const COUNTRY_DIGITS: &str = "1314";
const MASK: &str = "****";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IbanError {
    #[error("IBAN must be 'DE' followed by exactly 20 digits")]
    Format,

    #[error("IBAN check digits do not match (expected {expected}, got {actual})")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Bank code must be exactly 8 digits")]
    InvalidBankCode,

    #[error("Account number must be 1 to 10 digits")]
    InvalidAccountNumber,

    #[error("BIC must be 8 or 11 characters: 4 letter bank code, 2 letter country, 2 character location, optional 3 character branch")]
    InvalidBic,
}

/// A syntactically valid German IBAN with matching check digits, in compact uppercase form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GermanIban(String);

impl GermanIban {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn check_digits(&self) -> &str {
        &self.0[2..4]
    }

    pub fn bank_code(&self) -> &str {
        &self.0[4..4 + BANK_CODE_LEN]
    }

    pub fn account_number(&self) -> &str {
        &self.0[4 + BANK_CODE_LEN..]
    }

    /// Groups of four, as printed on mandates and statements.
    pub fn formatted(&self) -> String {
        self.0
            .as_bytes()
            .chunks(4)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for GermanIban {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip all whitespace and uppercase.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Validate a German IBAN: structure first, then the mod-97 checksum.
pub fn validate_german_iban(raw: &str) -> Result<GermanIban, IbanError> {
    let iban = normalize(raw);
    let bytes = iban.as_bytes();

    if bytes.len() != IBAN_LEN
        || &bytes[..2] != COUNTRY_CODE.as_bytes()
        || !bytes[2..].iter().all(u8::is_ascii_digit)
    {
        return Err(IbanError::Format);
    }

    let expected = check_digits_for(&iban[4..]);
    let actual = &iban[2..4];
    if expected != actual {
        return Err(IbanError::ChecksumMismatch {
            expected,
            actual: actual.to_string(),
        });
    }

    Ok(GermanIban(iban))
}

/// Build an IBAN from a legacy account number and bank code.
pub fn derive_iban(account_number: &str, bank_code: &str) -> Result<GermanIban, IbanError> {
    let bank_code = bank_code.trim();
    let account_number = account_number.trim();

    if bank_code.len() != BANK_CODE_LEN || !bank_code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IbanError::InvalidBankCode);
    }
    if account_number.is_empty()
        || account_number.len() > ACCOUNT_NUMBER_LEN
        || !account_number.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(IbanError::InvalidAccountNumber);
    }

    let bban = format!("{bank_code}{account_number:0>ACCOUNT_NUMBER_LEN$}");
    let check = check_digits_for(&bban);
    Ok(GermanIban(format!("{COUNTRY_CODE}{check}{bban}")))
}

/// `98 - (BBAN + "1314" + "00") mod 97`, zero-padded to two digits.
///
/// `bban` must be all ASCII digits.
fn check_digits_for(bban: &str) -> String {
    let remainder = mod97(bban.bytes().chain(COUNTRY_DIGITS.bytes()).chain(*b"00"));
    format!("{:02}", 98 - remainder)
}

/// Digit-wise remainder so the 24-digit number never has to fit into an integer.
fn mod97(digits: impl Iterator<Item = u8>) -> u32 {
    digits.fold(0u32, |acc, digit| (acc * 10 + u32::from(digit - b'0')) % 97)
}

/// Validate a BIC (ISO 9362) and return it in uppercase form.
pub fn validate_bic(raw: &str) -> Result<String, IbanError> {
    let bic = normalize(raw);
    let bytes = bic.as_bytes();

    if bytes.len() != 8 && bytes.len() != 11 {
        return Err(IbanError::InvalidBic);
    }
    let institution_ok = bytes[..4].iter().all(u8::is_ascii_alphabetic);
    let country_ok = bytes[4..6].iter().all(u8::is_ascii_alphabetic);
    let rest_ok = bytes[6..].iter().all(u8::is_ascii_alphanumeric);
    if !(institution_ok && country_ok && rest_ok) {
        return Err(IbanError::InvalidBic);
    }

    Ok(bic)
}

/// Show only the last four characters, e.g. `****3000`.
pub fn mask_iban(iban: &str) -> String {
    let compact = normalize(iban);
    let chars: Vec<char> = compact.chars().collect();
    if chars.len() <= 4 {
        return MASK.to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{MASK}{tail}")
}

/// Result of looking up a bank code in the reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankLookup {
    pub bank_code: String,
    pub identified: bool,
    pub bank_name: Option<String>,
    pub bic: Option<String>,
}

/// Resolve bank name and BIC for a German bank code. Unknown codes are not an error.
pub fn bank_lookup(bank_code: &str) -> BankLookup {
    let bank_code = bank_code.trim();
    match bank_directory::find(bank_code) {
        Some(entry) => BankLookup {
            bank_code: bank_code.to_string(),
            identified: true,
            bank_name: Some(entry.name.to_string()),
            bic: Some(entry.bic.to_string()),
        },
        None => BankLookup {
            bank_code: bank_code.to_string(),
            identified: false,
            bank_name: None,
            bic: None,
        },
    }
}
