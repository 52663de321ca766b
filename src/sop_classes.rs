use dicom::dictionary_std::uids;
use dicom::transfer_syntax::TransferSyntaxRegistry;

/// Abstract syntaxes accepted by default.
pub const ABSTRACT_SYNTAXES: &[&str] = &[
    uids::VERIFICATION,
    uids::COMPUTED_RADIOGRAPHY_IMAGE_STORAGE,
    "1.2.840.10008.5.1.4.1.1.1.1", // Digital X-Ray Image Storage - For Presentation
    "1.2.840.10008.5.1.4.1.1.1.2", // Digital Mammography X-Ray Image Storage - For Presentation
    "1.2.840.10008.5.1.4.1.1.2",   // CT Image Storage
    "1.2.840.10008.5.1.4.1.1.2.1", // Enhanced CT Image Storage
    "1.2.840.10008.5.1.4.1.1.3.1", // Ultrasound Multi-frame Image Storage
    "1.2.840.10008.5.1.4.1.1.4",   // MR Image Storage
    "1.2.840.10008.5.1.4.1.1.4.1", // Enhanced MR Image Storage
    "1.2.840.10008.5.1.4.1.1.6.1", // Ultrasound Image Storage
    uids::SECONDARY_CAPTURE_IMAGE_STORAGE,
    "1.2.840.10008.5.1.4.1.1.12.1", // X-Ray Angiographic Image Storage
    "1.2.840.10008.5.1.4.1.1.20",   // Nuclear Medicine Image Storage
    "1.2.840.10008.5.1.4.1.1.66",   // Raw Data Storage
    "1.2.840.10008.5.1.4.1.1.88.11", // Basic Text SR Storage
    "1.2.840.10008.5.1.4.1.1.88.22", // Enhanced SR Storage
    "1.2.840.10008.5.1.4.1.1.104.1", // Encapsulated PDF Storage
    "1.2.840.10008.5.1.4.1.1.128",  // Positron Emission Tomography Image Storage
    "1.2.840.10008.5.1.4.1.1.481.1", // RT Image Storage
];

/// Transfer syntaxes accepted by default.
///
/// With `uncompressed_only`, only implicit and explicit VR little endian.
/// Otherwise every transfer syntax the `dicom` registry can handle.
pub fn supported_transfer_syntaxes(uncompressed_only: bool) -> Vec<String> {
    if uncompressed_only {
        vec![
            uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
            uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string(),
        ]
    } else {
        TransferSyntaxRegistry
            .iter()
            .filter(|ts| !ts.is_unsupported())
            .map(|ts| ts.uid().to_string())
            .collect()
    }
}

/// Transfer syntaxes a requestor proposes when the caller names none.
pub fn default_proposed_transfer_syntaxes() -> Vec<String> {
    vec![
        uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string(),
        uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_transfer_syntaxes() {
        let uncompressed = supported_transfer_syntaxes(true);
        assert_eq!(uncompressed.len(), 2);
        let all = supported_transfer_syntaxes(false);
        assert!(all.iter().any(|ts| ts == uids::IMPLICIT_VR_LITTLE_ENDIAN));
        assert!(all.iter().any(|ts| ts == uids::EXPLICIT_VR_LITTLE_ENDIAN));
    }
}
