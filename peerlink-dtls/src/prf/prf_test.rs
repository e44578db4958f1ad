use super::*;

fn decode_hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

#[test]
fn test_prf_p_hash_sha256() -> Result<()> {
    let secret = decode_hex("9bbe436ba940f017b17652849a71db35");
    let mut seed = b"test label".to_vec();
    seed.extend_from_slice(&decode_hex("a0ba9f936cda311827a6f796ffd5198c"));

    let expected = decode_hex(
        "e3f229ba727be17b8d122620557cd453c2aab21d07c3d495329b52d4e61edb5a\
         6b301791e90d35c9c9a46b4e14baf9af0fa022f7077def17abfd3797c0564bab\
         4fbc91666e9def9b97fce34f796789baa48082d122ee42c5a72e5a5110fff701\
         87347b66",
    );

    let out = prf_p_hash(&secret, &seed, 100)?;
    assert_eq!(out, expected);
    Ok(())
}

#[test]
fn test_prf_encryption_keys_layout() -> Result<()> {
    let master_secret = [0x0bu8; 48];
    let client_random = [0x01u8; 32];
    let server_random = [0x02u8; 32];

    let keys = prf_encryption_keys(&master_secret, &client_random, &server_random, 0, 16, 4)?;
    assert!(keys.client_mac_key.is_empty());
    assert_eq!(keys.client_write_key.len(), 16);
    assert_eq!(keys.server_write_iv.len(), 4);

    let mut seed = b"key expansion".to_vec();
    seed.extend_from_slice(&server_random);
    seed.extend_from_slice(&client_random);
    let block = prf_p_hash(&master_secret, &seed, 40)?;
    assert_eq!(keys.client_write_key, block[..16].to_vec());
    assert_eq!(keys.server_write_key, block[16..32].to_vec());
    assert_eq!(keys.client_write_iv, block[32..36].to_vec());
    assert_eq!(keys.server_write_iv, block[36..40].to_vec());

    Ok(())
}

#[test]
fn test_prf_verify_data() -> Result<()> {
    let master_secret = [0x0bu8; 48];
    let client = prf_verify_data_client(&master_secret, b"transcript")?;
    let server = prf_verify_data_server(&master_secret, b"transcript")?;
    assert_eq!(client.len(), 12);
    assert_eq!(server.len(), 12);
    assert_ne!(client, server);
    Ok(())
}
