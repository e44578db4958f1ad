use super::*;
use crate::crypto::crypto_gcm::*;
use crate::prf::*;

const PRF_MAC_LEN: usize = 0;
const PRF_KEY_LEN: usize = 16;
const PRF_IV_LEN: usize = 4;

#[derive(Default)]
pub struct CipherSuiteAes128GcmSha256 {
    gcm: Option<CryptoGcm>,
}

impl CipherSuiteAes128GcmSha256 {
    pub fn new() -> Self {
        CipherSuiteAes128GcmSha256 { gcm: None }
    }
}

impl CipherSuite for CipherSuiteAes128GcmSha256 {
    fn to_string(&self) -> String {
        "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256".to_owned()
    }

    fn id(&self) -> CipherSuiteId {
        CipherSuiteId::Tls_Ecdhe_Ecdsa_With_Aes_128_Gcm_Sha256
    }

    fn certificate_type(&self) -> ClientCertificateType {
        ClientCertificateType::EcdsaSign
    }

    fn is_initialized(&self) -> bool {
        self.gcm.is_some()
    }

    fn init(
        &mut self,
        master_secret: &[u8],
        client_random: &[u8],
        server_random: &[u8],
        is_client: bool,
    ) -> Result<()> {
        let keys = prf_encryption_keys(
            master_secret,
            client_random,
            server_random,
            PRF_MAC_LEN,
            PRF_KEY_LEN,
            PRF_IV_LEN,
        )?;

        self.gcm = Some(if is_client {
            CryptoGcm::new(
                &keys.client_write_key,
                &keys.client_write_iv,
                &keys.server_write_key,
                &keys.server_write_iv,
            )?
        } else {
            CryptoGcm::new(
                &keys.server_write_key,
                &keys.server_write_iv,
                &keys.client_write_key,
                &keys.client_write_iv,
            )?
        });

        Ok(())
    }

    fn encrypt(&self, pkt_rlh: &RecordLayerHeader, raw: &[u8]) -> Result<Vec<u8>> {
        match &self.gcm {
            Some(gcm) => gcm.encrypt(pkt_rlh, raw),
            None => Err(Error::OtherDtlsErr(
                "CipherSuite has not been initialized, unable to encrypt".to_owned(),
            )),
        }
    }

    fn decrypt(&self, input: &[u8]) -> Result<Vec<u8>> {
        match &self.gcm {
            Some(gcm) => gcm.decrypt(input),
            None => Err(Error::OtherDtlsErr(
                "CipherSuite has not been initialized, unable to decrypt".to_owned(),
            )),
        }
    }
}
