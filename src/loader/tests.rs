use super::{Config, WeightMap};
use crate::error::EmbeddingError;
use crate::tensor::{Shape, TensorStorage};

#[test]
fn test_default_config_matches_bert_tiny() {
    let config = Config::default();
    assert_eq!(config.hidden_size, 128);
    assert_eq!(config.vocab_size, 30522);
    assert_eq!(config.max_position_embeddings, 512);
    assert_eq!(config.type_vocab_size, 2);
    assert_eq!(config.pad_token_id, 0);
    assert_eq!(config.layer_norm_eps, 1e-12);
    assert_eq!(config.hidden_dropout_prob, 0.1);
    assert!((config.gelu_alpha - 0.797_884_6).abs() < 1e-7);
    assert_eq!(config.gelu_beta, 0.044715);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_from_hf_json() {
    let json = r#"{
        "architectures": ["BertForMaskedLM"],
        "attention_probs_dropout_prob": 0.1,
        "hidden_act": "gelu",
        "hidden_dropout_prob": 0.1,
        "hidden_size": 128,
        "initializer_range": 0.02,
        "intermediate_size": 512,
        "layer_norm_eps": 1e-12,
        "max_position_embeddings": 512,
        "model_type": "bert",
        "num_attention_heads": 2,
        "num_hidden_layers": 2,
        "pad_token_id": 0,
        "position_embedding_type": "absolute",
        "type_vocab_size": 2,
        "vocab_size": 30522
    }"#;

    let config = Config::from_json(json).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_partial_config_uses_defaults() {
    let config = Config::from_json(r#"{ "hidden_size": 16, "dropout_rate": 0.0 }"#).unwrap();
    assert_eq!(config.hidden_size, 16);
    assert_eq!(config.hidden_dropout_prob, 0.0);
    assert_eq!(config.vocab_size, 30522);
}

#[test]
fn test_config_round_trips_through_json() {
    let config = Config {
        hidden_size: 8,
        dropout_seed: 7,
        ..Config::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(Config::from_json(&json).unwrap(), config);
}

#[test]
fn test_malformed_json_is_config_error() {
    let err = Config::from_json("{ hidden_size: ").unwrap_err();
    assert!(matches!(err, EmbeddingError::InvalidConfig { .. }));
}

#[test]
fn test_validate_rejects_bad_fields() {
    let cases = [
        (Config { hidden_size: 0, ..Config::default() }, "hidden_size"),
        (Config { type_vocab_size: 0, ..Config::default() }, "type_vocab_size"),
        (Config { pad_token_id: 30522, ..Config::default() }, "pad_token_id"),
        (Config { pad_token_id: 512, ..Config::default() }, "pad_token_id"),
        (Config { layer_norm_eps: 0.0, ..Config::default() }, "layer_norm_eps"),
        (Config { hidden_dropout_prob: 1.5, ..Config::default() }, "hidden_dropout_prob"),
        (Config { hidden_dropout_prob: f32::NAN, ..Config::default() }, "hidden_dropout_prob"),
        (
            Config {
                position_embedding_type: "relative_key".to_string(),
                ..Config::default()
            },
            "position_embedding_type",
        ),
    ];

    for (config, expected_field) in cases {
        match config.validate() {
            Err(EmbeddingError::InvalidConfig { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected InvalidConfig for {expected_field}, got {other:?}"),
        }
    }
}

#[test]
fn test_resolve_prefers_first_alias() {
    let mut weights = WeightMap::new();
    weights.insert_f32("LayerNorm.bias", &[2], vec![1.0, 1.0]).unwrap();
    weights.insert_f32("LayerNorm.beta", &[2], vec![2.0, 2.0]).unwrap();

    let (name, tensor) = weights.resolve(&["LayerNorm.beta", "LayerNorm.bias"]).unwrap();
    assert_eq!(name, "LayerNorm.beta");
    assert_eq!(tensor.as_f32_slice(), Some(&[2.0, 2.0][..]));

    let (name, _) = weights.resolve(&["LayerNorm.gamma", "LayerNorm.bias"]).unwrap();
    assert_eq!(name, "LayerNorm.bias");
}

#[test]
fn test_resolve_reports_canonical_name() {
    let weights = WeightMap::new();
    let err = weights.resolve(&["a.gamma", "a.weight"]).unwrap_err();
    assert_eq!(
        err,
        EmbeddingError::MissingWeight {
            name: "a.gamma".to_string()
        }
    );
}

#[test]
fn test_matrix_shape_checks() {
    let mut weights = WeightMap::new();
    weights
        .insert_f32("table", &[3, 2], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
        .unwrap();
    weights.insert_f32("flat", &[6], vec![0.0; 6]).unwrap();

    let m = weights.matrix(&["table"], 3, 2).unwrap();
    assert_eq!(m.row(2).to_vec(), vec![4.0, 5.0]);

    // Transposed layout has the right element count but the wrong shape
    let err = weights.matrix(&["table"], 2, 3).unwrap_err();
    assert!(matches!(err, EmbeddingError::ShapeMismatch { ref name, .. } if name == "table"));

    assert_eq!(weights.matrix(&["flat"], 2, 3).unwrap().dim(), (2, 3));
    assert!(weights.matrix(&["flat"], 2, 2).is_err());
}

#[test]
fn test_vector_widens_half_precision() {
    let mut weights = WeightMap::new();
    weights.insert(
        "gamma",
        TensorStorage::from_f32_as_f16(Shape::vector(3), vec![1.0, 0.5, 2.0]).unwrap(),
    );
    let v = weights.vector(&["gamma"], 3).unwrap();
    assert_eq!(v.to_vec(), vec![1.0, 0.5, 2.0]);

    let err = weights.vector(&["gamma"], 4).unwrap_err();
    assert!(matches!(err, EmbeddingError::ShapeMismatch { .. }));
}

#[test]
fn test_insert_f32_names_bad_tensor() {
    let mut weights = WeightMap::new();
    let err = weights.insert_f32("word", &[2, 2], vec![0.0; 3]).unwrap_err();
    assert!(matches!(err, EmbeddingError::ShapeMismatch { ref name, .. } if name == "word"));
    assert!(weights.is_empty());
}

#[test]
fn test_from_iterator() {
    let weights: WeightMap = [(
        "x".to_string(),
        TensorStorage::from_f32(Shape::vector(1), vec![1.0]).unwrap(),
    )]
    .into_iter()
    .collect();
    assert_eq!(weights.len(), 1);
    assert!(weights.contains("x"));
    assert_eq!(weights.get_tensor_shape("x"), Some(&[1][..]));
}
