//! Maildir keyword letters
//!
//! Maildir filenames only carry single-letter flags. Flags outside the
//! standard DFRST set get a lowercase letter, assigned in first-seen order,
//! and the mapping is written to a `dovecot-keywords` file.

use std::collections::HashMap;

/// Number of letters available for keywords
pub const MAX_KEYWORDS: usize = 26;

/// Letter assignment for one mailbox export
#[derive(Debug, Default)]
pub struct MaildirFlags {
    map: HashMap<String, usize>,
    list: Vec<String>,
}

impl MaildirFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Letter for a keyword, assigning the next free one on first use.
    /// `None` once all 26 letters are taken by other keywords.
    pub fn flag(&mut self, flag: &str) -> Option<char> {
        let index = match self.map.get(flag) {
            Some(index) => *index,
            None => {
                if self.list.len() >= MAX_KEYWORDS {
                    return None;
                }
                let index = self.list.len();
                self.map.insert(flag.to_string(), index);
                self.list.push(flag.to_string());
                index
            }
        };
        Some((b'a' + index as u8) as char)
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Contents of the dovecot-keywords file: "<index> <keyword>" per line
    pub fn keywords_file(&self) -> String {
        self.list
            .iter()
            .enumerate()
            .map(|(i, flag)| format!("{} {}\n", i, flag))
            .collect()
    }
}
