use std::{borrow::Cow, fs, path::Path, result};

use anyhow::{Context, Result};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use sha2::{Digest, Sha256};

/// Hashes identifying the analyzed package.
#[derive(Debug, Clone)]
pub struct FingerPrint {
    md5: [u8; 16],
    sha1: [u8; 20],
    sha256: [u8; 32],
}

impl FingerPrint {
    /// Computes the fingerprint of the given package file.
    pub fn new<P: AsRef<Path>>(package: P) -> Result<Self> {
        let bytes = fs::read(package.as_ref()).with_context(|| {
            format!(
                "could not read the package at {} for fingerprinting",
                package.as_ref().display()
            )
        })?;

        Ok(Self {
            md5: md5::compute(&bytes).0,
            sha1: sha1::Sha1::from(&bytes).digest().bytes(),
            sha256: Sha256::digest(&bytes).into(),
        })
    }

    /// Gets the MD5 hash as a hexadecimal string.
    ///
    /// This is the hash MobSF identifies uploads by.
    pub fn md5_hex(&self) -> String {
        hex::encode(self.md5)
    }
}

impl Serialize for FingerPrint {
    fn serialize<S>(&self, serializer: S) -> result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ser_struct = serializer.serialize_struct("FingerPrint", 3)?;
        ser_struct.serialize_field("md5", &hex::encode(self.md5))?;
        ser_struct.serialize_field("sha1", &hex::encode(self.sha1))?;
        ser_struct.serialize_field("sha256", &hex::encode(self.sha256))?;
        ser_struct.end()
    }
}

/// Escapes the HTML special characters of the given string.
pub fn html_escape(code: &str) -> Cow<str> {
    if !code.contains(|c| matches!(c, '<' | '>' | '&' | '\'' | '"')) {
        return Cow::Borrowed(code);
    }

    let mut result = String::with_capacity(code.len());
    for c in code.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '\'' => result.push_str("&#39;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

#[cfg(test)]
mod tests {
    use super::{html_escape, FingerPrint};
    use std::{borrow::Cow, io::Write};

    /// Test the fingerprint against the known hashes of "abc".
    #[test]
    fn it_fingerprint() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();

        let fingerprint = FingerPrint::new(file.path()).unwrap();

        assert_eq!(fingerprint.md5_hex(), "900150983cd24fb0d6963f7d28e17f72");

        let json = serde_json::to_value(&fingerprint).unwrap();
        assert_eq!(json["md5"], "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(json["sha1"], "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(
            json["sha256"],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    /// Test fingerprinting a missing file.
    #[test]
    fn it_fingerprint_missing() {
        assert!(FingerPrint::new("does/not/exist.apk").is_err());
    }

    /// Test the HTML escaping.
    #[test]
    fn it_html_escape() {
        assert_eq!(html_escape("plain text"), Cow::Borrowed("plain text"));
        assert_eq!(
            html_escape(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }
}
