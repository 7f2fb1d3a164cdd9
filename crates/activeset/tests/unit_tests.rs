//! Unit tests for the active-set crate's public API

type TestResult = Result<(), Box<dyn std::error::Error>>;

mod codec_tests {
    use super::TestResult;
    use activeset::prelude::*;
    use activeset::{ACTIVE_KEY, HEADER_LEN};

    #[test]
    fn test_block_layout() -> TestResult {
        let codec = ConfigCodec::new(32)?;
        let mut mapping = Mapping::new();
        mapping.insert("b".to_string(), "2".to_string());
        mapping.insert("a".to_string(), "1".to_string());

        let block = codec.serialize(&mapping)?;
        assert_eq!(block.len(), 32);

        let (header, payload) = block.split_at(HEADER_LEN);
        // Sorted records, terminating empty record, zero padding.
        assert!(payload.starts_with(b"a=1\0b=2\0\0"));
        assert!(payload.iter().skip(9).all(|b| *b == 0));
        assert_eq!(header, crc32fast::hash(payload).to_le_bytes());
        Ok(())
    }

    #[test]
    fn test_empty_mapping_is_valid_block() -> TestResult {
        let codec = ConfigCodec::new(16)?;
        let block = codec.serialize(&Mapping::new())?;
        assert!(codec.parse(&block)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_exact_fit_and_one_over() -> TestResult {
        let codec = ConfigCodec::new(13)?;
        // "k=vvvvv\0" plus terminator fills the 9 payload bytes exactly.
        let mut mapping = Mapping::new();
        mapping.insert("k".to_string(), "vvvvv".to_string());
        let block = codec.serialize(&mapping)?;
        assert_eq!(codec.parse(&block)?, mapping);

        mapping.insert("k".to_string(), "vvvvvv".to_string());
        assert!(matches!(
            codec.serialize(&mapping),
            Err(CodecError::PayloadTooLarge {
                needed: 10,
                capacity: 9
            })
        ));
        Ok(())
    }

    #[test]
    fn test_erased_block_fails_checksum() -> TestResult {
        let codec = ConfigCodec::new(64)?;
        assert!(matches!(
            codec.parse(&[0xFF; 64]),
            Err(CodecError::ChecksumMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_active_flag_helpers() {
        let mut mapping = Mapping::new();
        assert!(!is_active(&mapping));

        set_active_flag(&mut mapping, true);
        assert!(is_active(&mapping));
        assert_eq!(mapping.get(ACTIVE_KEY).map(String::as_str), Some("1"));

        set_active_flag(&mut mapping, false);
        assert!(!is_active(&mapping));
        assert_eq!(mapping.get(ACTIVE_KEY).map(String::as_str), Some("0"));

        for value in ["yes", "true", " 1", "01", ""] {
            mapping.insert(ACTIVE_KEY.to_string(), value.to_string());
            assert!(!is_active(&mapping), "{value:?} must not count as active");
        }
    }
}

mod config_tests {
    use super::TestResult;
    use activeset::prelude::*;
    use activeset::{DEFAULT_SLOT_LEN, DEFAULT_SLOT_OFFSETS};

    #[test]
    fn test_reference_layout() -> TestResult {
        let layout = LayoutConfig::default();
        assert_eq!(layout.slot_offsets, DEFAULT_SLOT_OFFSETS.to_vec());
        assert_eq!(layout.slot_len, DEFAULT_SLOT_LEN);
        assert_eq!(layout.watchdog_sentinel, WATCHDOG_RESET_CAUSE);
        layout.validate()?;
        Ok(())
    }

    #[test]
    fn test_layout_json_round_trip() -> TestResult {
        let layout = LayoutConfig::contiguous(3, 512);
        let json = serde_json::to_string(&layout)?;
        let parsed: LayoutConfig = serde_json::from_str(&json)?;
        assert_eq!(parsed, layout);
        Ok(())
    }

    #[test]
    fn test_empty_json_is_reference_layout() -> TestResult {
        let parsed: LayoutConfig = serde_json::from_str("{}")?;
        assert_eq!(parsed, LayoutConfig::default());
        Ok(())
    }
}

mod reset_cause_tests {
    use super::TestResult;
    use activeset::{describe_reset_cause, parse_reset_cause};

    #[test]
    fn test_parse_and_describe() -> TestResult {
        let cause = parse_reset_cause("0x10")?;
        assert_eq!(describe_reset_cause(cause), vec!["watchdog"]);
        assert_eq!(describe_reset_cause(parse_reset_cause("1")?), vec!["power-on"]);
        Ok(())
    }
}

mod error_tests {
    use activeset::prelude::*;

    #[test]
    fn test_error_messages_name_the_slot() {
        let err = SelectorError::InvalidIndex {
            index: -1,
            count: 2,
        };
        assert!(err.to_string().contains("-1"));

        let err = SlotError::NoSuchSlot { slot: 5, count: 2 };
        assert_eq!(err.slot(), 5);
        assert!(!err.is_unusable());
    }
}
