//! License file detection and a keyword-based classifier.

use modex_core::module::LicenseMetadata;

/// Classifies the contents of one license file.
pub trait LicenseClassifier: Send + Sync {
  /// Licenses found in the file at `file_path`. A license file whose text is
  /// not recognised yields one entry with no types.
  fn classify(&self, file_path: &str, contents: &[u8]) -> Vec<LicenseMetadata>;

  /// Whether content under `license_type` may be redistributed.
  fn is_redistributable(&self, license_type: &str) -> bool;
}

const LICENSE_STEMS: &[&str] = &["LICENSE", "LICENCE", "COPYING"];
const LICENSE_EXTENSIONS: &[&str] = &["", "md", "markdown", "txt", "rst"];

/// Whether `file_name` (no directory) names a license file.
pub fn is_license_file(file_name: &str) -> bool {
  let upper = file_name.to_ascii_uppercase();
  let (stem, ext) = upper.split_once('.').unwrap_or((upper.as_str(), ""));
  LICENSE_STEMS.contains(&stem) && LICENSE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

// ─── Keyword classifier ──────────────────────────────────────────────────────

/// `(license type, phrases that must all appear)`, most specific first. Only
/// the first matching rule counts.
const RULES: &[(&str, &[&str])] = &[
  ("Apache-2.0", &["Apache License", "Version 2.0"]),
  ("AGPL-3.0", &["GNU AFFERO GENERAL PUBLIC LICENSE", "Version 3"]),
  ("LGPL-3.0", &["GNU LESSER GENERAL PUBLIC LICENSE", "Version 3"]),
  ("GPL-3.0", &["GNU GENERAL PUBLIC LICENSE", "Version 3"]),
  ("GPL-2.0", &["GNU GENERAL PUBLIC LICENSE", "Version 2"]),
  ("MPL-2.0", &["Mozilla Public License Version 2.0"]),
  (
    "BSD-3-Clause",
    &["Redistribution and use in source and binary forms", "Neither the name"],
  ),
  ("BSD-2-Clause", &["Redistribution and use in source and binary forms"]),
  ("MIT", &["Permission is hereby granted, free of charge"]),
  (
    "ISC",
    &["Permission to use, copy, modify, and/or distribute this software for any purpose"],
  ),
  (
    "Unlicense",
    &["This is free and unencumbered software released into the public domain"],
  ),
  ("CC0-1.0", &["CC0 1.0 Universal"]),
];

/// Matches well-known license texts by characteristic phrases.
///
/// Every type it can recognise is considered redistributable; unrecognised
/// text is not.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl LicenseClassifier for KeywordClassifier {
  fn classify(&self, file_path: &str, contents: &[u8]) -> Vec<LicenseMetadata> {
    let text = String::from_utf8_lossy(contents);
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let types = RULES
      .iter()
      .find(|(_, phrases)| phrases.iter().all(|p| normalized.contains(p)))
      .map(|(ty, _)| vec![(*ty).to_owned()])
      .unwrap_or_default();

    vec![LicenseMetadata { types, file_path: file_path.to_owned() }]
  }

  fn is_redistributable(&self, license_type: &str) -> bool {
    RULES.iter().any(|(ty, _)| *ty == license_type)
  }
}

#[cfg(test)]
pub(crate) const MIT_LICENSE: &str = "MIT License

Copyright (c) 2019 Example Authors

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the \"Software\"), to deal
in the Software without restriction.";
