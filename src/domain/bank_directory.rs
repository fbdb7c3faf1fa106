//! Static reference table of German bank codes (BLZ).
//!
//! Covers the institutions studio members bank with most often. Codes that are not
//! listed resolve to an unidentified bank rather than an error.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankEntry {
    pub bank_code: &'static str,
    pub name: &'static str,
    pub bic: &'static str,
}

const fn entry(bank_code: &'static str, name: &'static str, bic: &'static str) -> BankEntry {
    BankEntry {
        bank_code,
        name,
        bic,
    }
}

/// Sorted by bank code so lookups can binary search.
static BANKS: &[BankEntry] = &[
    entry("10010010", "Postbank Berlin", "PBNKDEFFXXX"),
    entry("10011001", "N26 Bank", "NTSBDEB1XXX"),
    entry("10050000", "Berliner Sparkasse", "BELADEBEXXX"),
    entry("10070000", "Deutsche Bank Berlin", "DEUTDEBBXXX"),
    entry("12030000", "Deutsche Kreditbank Berlin", "BYLADEM1001"),
    entry("20050550", "Hamburger Sparkasse", "HASPDEHHXXX"),
    entry("20070000", "Deutsche Bank Hamburg", "DEUTDEHHXXX"),
    entry("25050180", "Sparkasse Hannover", "SPKHDE2HXXX"),
    entry("30050110", "Stadtsparkasse Düsseldorf", "DUSSDEDDXXX"),
    entry("37040044", "Commerzbank Köln", "COBADEFFXXX"),
    entry("37050198", "Sparkasse KölnBonn", "COLSDE33XXX"),
    entry("37070060", "Deutsche Bank Köln", "DEUTDEDKXXX"),
    entry("43060967", "GLS Gemeinschaftsbank", "GENODEM1GLS"),
    entry("50010517", "ING-DiBa", "INGDDEFFXXX"),
    entry("50040000", "Commerzbank Frankfurt", "COBADEFFXXX"),
    entry("50050201", "Frankfurter Sparkasse", "HELADEF1822"),
    entry("50070010", "Deutsche Bank Frankfurt", "DEUTDEFFXXX"),
    entry("60050101", "BW-Bank Stuttgart", "SOLADEST600"),
    entry("70020270", "HypoVereinsbank München", "HYVEDEMMXXX"),
    entry("70150000", "Stadtsparkasse München", "SSKMDEMMXXX"),
    entry("76026000", "norisbank", "NORSDE51XXX"),
];

/// Find the entry for an 8-digit bank code.
pub fn find(bank_code: &str) -> Option<&'static BankEntry> {
    BANKS
        .binary_search_by(|entry| entry.bank_code.cmp(bank_code))
        .ok()
        .map(|index| &BANKS[index])
}
