use osdetect::probes::smb::{
    banner_observation, challenge_observation, parse_ntlmssp_version, NtlmVersion,
    NTLMSSP_CHALLENGE,
};

/// Minimal CHALLENGE blob: signature, message type, zeroed fixed fields,
/// the Version record at signature+48, then the start of the payload.
fn challenge_blob(major: u8, minor: u8, build: u16) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(b"NTLMSSP\0");
    b.extend_from_slice(&NTLMSSP_CHALLENGE.to_le_bytes());
    b.extend_from_slice(&[0u8; 36]); // TargetName, flags, challenge, reserved, TargetInfo
    b.push(major);
    b.push(minor);
    b.extend_from_slice(&build.to_le_bytes());
    b.extend_from_slice(&[0, 0, 0, 0x0f]); // reserved + revision
    b.extend_from_slice(&[0u8; 8]); // payload begins here
    assert_eq!(b.len(), 64);
    b
}

#[test]
fn version_record_roundtrips_through_the_wire_layout() {
    let v = NtlmVersion {
        major: 10,
        minor: 0,
        build: 22631,
        reserved: [0, 0, 0],
        ntlm_revision: 0x0f,
    };
    assert_eq!(NtlmVersion::from_bytes(&v.to_bytes()), v);
}

#[test]
fn parse_reads_the_version_at_the_fixed_offset() {
    let v = parse_ntlmssp_version(&challenge_blob(10, 0, 22631)).unwrap();
    assert_eq!(v.major, 10);
    assert_eq!(v.minor, 0);
    assert_eq!(v.build, 22631);
    assert_eq!(v.ntlm_revision, 0x0f);
}

#[test]
fn parse_finds_the_signature_mid_buffer() {
    let mut data = vec![0xaa; 17];
    data.extend_from_slice(&challenge_blob(6, 1, 7601));
    let v = parse_ntlmssp_version(&data).unwrap();
    assert_eq!((v.major, v.minor, v.build), (6, 1, 7601));
}

#[test]
fn parse_rejects_truncated_messages() {
    let blob = challenge_blob(10, 0, 19045);
    assert!(parse_ntlmssp_version(&blob[..63]).is_err());
    assert!(parse_ntlmssp_version(&blob[..64]).is_ok());
}

#[test]
fn parse_rejects_non_challenge_messages() {
    let mut blob = challenge_blob(10, 0, 19045);
    blob[8] = 1; // NEGOTIATE, not CHALLENGE
    assert!(parse_ntlmssp_version(&blob).is_err());
}

#[test]
fn parse_requires_the_signature() {
    assert!(parse_ntlmssp_version(&[0u8; 128]).is_err());
    assert!(parse_ntlmssp_version(b"NTLMSSP").is_err());
}

#[test]
fn build_number_separates_windows_11_from_10() {
    let win11 = challenge_observation(&NtlmVersion {
        major: 10,
        minor: 0,
        build: 22631,
        reserved: [0; 3],
        ntlm_revision: 0x0f,
    })
    .unwrap();
    assert!(win11.replace);
    assert!(win11.candidates.contains("Windows 10"));
    assert!(win11.candidates.contains("Windows 11"));
    assert!(win11.weights.contains(&("Windows 11", 5)));
    assert!(win11.weights.contains(&("Windows 10", 3)));

    let win10 = challenge_observation(&NtlmVersion {
        major: 10,
        minor: 0,
        build: 19045,
        reserved: [0; 3],
        ntlm_revision: 0x0f,
    })
    .unwrap();
    assert!(win10.weights.contains(&("Windows 10", 5)));
    assert!(win10.weights.contains(&("Windows 11", 3)));
}

#[test]
fn legacy_versions_map_to_their_labels() {
    let v7 = NtlmVersion {
        major: 6,
        minor: 1,
        build: 7601,
        reserved: [0; 3],
        ntlm_revision: 0x0f,
    };
    let obs = challenge_observation(&v7).unwrap();
    assert_eq!(obs.candidates.len(), 1);
    assert!(obs.candidates.contains("Windows 7"));
    assert!(obs.weights.contains(&("Windows 7", 5)));

    let v8 = NtlmVersion { minor: 2, ..v7 };
    assert!(challenge_observation(&v8)
        .unwrap()
        .candidates
        .contains("Windows 8"));

    let xp = NtlmVersion {
        major: 5,
        minor: 1,
        build: 2600,
        ..v7
    };
    assert!(challenge_observation(&xp)
        .unwrap()
        .candidates
        .contains("Windows XP"));

    let unknown = NtlmVersion { major: 4, ..v7 };
    assert!(challenge_observation(&unknown).is_none());
}

#[test]
fn banner_fallback_matches_version_strings() {
    let obs = banner_observation(b"native os Windows Server 2008 R2 6.1 build").unwrap();
    assert!(obs.replace);
    assert!(obs.candidates.contains("Windows 7"));

    let obs = banner_observation(b"Windows 10.0 something").unwrap();
    assert!(obs.candidates.contains("Windows 10"));

    assert!(banner_observation(b"Samba 4.13 Ubuntu").is_none());
    assert!(banner_observation(b"Windows but no version digits").is_none());
}
