use graphjar_binary::{deserialize, read_indexes, ExternalReferenceSerializerLibrary};
use proptest::prelude::*;

use super::fixtures::TwoSources;

const MAX_FUZZ_INPUT_LEN: usize = 16 * 1024;

fn valid_unit() -> Vec<u8> {
    let model = TwoSources::new();
    model.serialize(&model.source2).bytes
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn decode_never_panics_on_random_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..=MAX_FUZZ_INPUT_LEN)) {
        let library = ExternalReferenceSerializerLibrary::with_builtin();
        let _ = read_indexes(&bytes);
        let _ = deserialize(&bytes, &library);
    }

    #[test]
    fn decode_rejects_truncated_units(cut in 0usize..1024) {
        let bytes = valid_unit();
        let cut = cut % bytes.len();
        let library = ExternalReferenceSerializerLibrary::with_builtin();
        prop_assert!(deserialize(&bytes[..cut], &library).is_err());
    }

    #[test]
    fn decode_never_panics_on_corrupted_units(
        flips in proptest::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 1..8),
    ) {
        let mut bytes = valid_unit();
        for (index, value) in flips {
            let at = index.index(bytes.len());
            bytes[at] = value;
        }
        let library = ExternalReferenceSerializerLibrary::with_builtin();
        let _ = deserialize(&bytes, &library);
    }
}
