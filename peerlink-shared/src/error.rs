#![allow(dead_code)]

use std::io;
use std::net;
use std::num::ParseIntError;
use std::string::FromUtf8Error;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer too small")]
    ErrBufferTooSmall,
    #[error("use of closed network connection")]
    ErrClosed,
    #[error("failed to parse address")]
    ErrAddressParseFailed,

    //STUN errors
    #[error("attribute not found")]
    ErrAttributeNotFound,
    #[error("attribute size is invalid")]
    ErrAttributeSizeInvalid,
    #[error("attribute size overflow")]
    ErrAttributeSizeOverflow,
    #[error("integrity check failed")]
    ErrIntegrityMismatch,
    #[error("fingerprint check failed")]
    ErrFingerprintMismatch,
    #[error("FINGERPRINT before MESSAGE-INTEGRITY attribute")]
    ErrFingerprintBeforeIntegrity,
    #[error("unexpected EOF: not enough bytes to read header")]
    ErrUnexpectedHeaderEof,
    #[error("{0:x} is invalid magic cookie (should be 2112a442)")]
    ErrInvalidMagicCookie(u32),
    #[error("buffer length {0} is less than {1} (expected message size)")]
    ErrBufferLengthMismatch(usize, usize),
    #[error("unexpected STUN request message")]
    ErrUnexpectedStunrequestMessage,
    #[error("stun: error response {code}: {reason}")]
    ErrStunErrorResponse { code: u16, reason: String },
    #[error("transaction exists with same id")]
    ErrTransactionExists,
    #[error("transaction is timed out")]
    ErrTransactionTimeOut,
    #[error("invalid url")]
    ErrInvalidUrl,
    #[error("unknown scheme type")]
    ErrSchemeType,
    #[error("invalid hostname")]
    ErrHost,
    #[error("url parse: invalid port number")]
    ErrPort,
    #[error("too many DTLS-in-STUN acks")]
    ErrTooManyPiggybackAcks,

    //ICE errors
    #[error("attribute not long enough to be ICE candidate")]
    ErrAttributeTooShortIceCandidate,
    #[error("unknown candidate type")]
    ErrUnknownCandidateType,
    #[error("could not parse component")]
    ErrParseComponent,
    #[error("could not parse priority")]
    ErrParsePriority,
    #[error("could not parse port")]
    ErrParsePort,
    #[error("could not parse related addresses")]
    ErrParseRelatedAddr,
    #[error("could not parse type")]
    ErrParseType,
    #[error("gatherer has already been started")]
    ErrMultipleGatherAttempted,
    #[error("gatherer is closed")]
    ErrGathererClosed,
    #[error("dns: failed to resolve {0}")]
    ErrDnsResolveFailed(String),
    #[error("username mismatch")]
    ErrMismatchUsername,
    #[error("no selected candidate pair")]
    ErrNoSelectedCandidatePair,
    #[error("local username fragment is less than 24 bits long")]
    ErrLocalUfragInsufficientBits,
    #[error("local password is less than 128 bits long")]
    ErrLocalPwdInsufficientBits,
    #[error("remote ufrag is empty")]
    ErrRemoteUfragEmpty,
    #[error("remote pwd is empty")]
    ErrRemotePwdEmpty,
    #[error("unknown network type")]
    ErrUnknownNetworkType,
    #[error("remote mDNS candidate added, but mDNS is disabled")]
    ErrMulticastDnsNotSupported,
    #[error("unhandled STUN packet")]
    ErrUnhandledStunpacket,
    #[error("gather has not been started")]
    ErrGatherNotStarted,

    //DTLS errors
    #[error("conn is closed")]
    ErrConnClosed,
    #[error("handshake timed out after exhausting retransmissions")]
    ErrHandshakeTimeout,
    #[error("invalid content type")]
    ErrInvalidContentType,
    #[error("packet length and declared length do not match")]
    ErrInvalidPacketLength,
    #[error("unsupported protocol version")]
    ErrUnsupportedProtocolVersion,
    #[error("client+server do not support any shared cipher suites")]
    ErrCipherSuiteNoIntersection,
    #[error("server required client verification, but got none")]
    ErrClientCertificateRequired,
    #[error("client+server cookie does not match")]
    ErrCookieMismatch,
    #[error("cookie must not be longer then 255 bytes")]
    ErrCookieTooLong,
    #[error("no certificate provided")]
    ErrInvalidCertificate,
    #[error("invalid or unknown cipher suite")]
    ErrInvalidCipherSuite,
    #[error("invalid or unknown compression method")]
    ErrInvalidCompressionMethod,
    #[error("invalid or unknown elliptic curve type")]
    ErrInvalidEllipticCurveType,
    #[error("invalid hash algorithm")]
    ErrInvalidHashAlgorithm,
    #[error("invalid named curve")]
    ErrInvalidNamedCurve,
    #[error("invalid private key type")]
    ErrInvalidPrivateKey,
    #[error("invalid signature algorithm")]
    ErrInvalidSignatureAlgorithm,
    #[error("key signature mismatch")]
    ErrKeySignatureMismatch,
    #[error("no certificates configured")]
    ErrNoCertificates,
    #[error("invalid state machine transition")]
    ErrInvalidFsmTransition,
    #[error("Alert is Fatal or Close Notify")]
    ErrAlertFatalOrClose,
    #[error("expected and actual verify data does not match")]
    ErrVerifyDataMismatch,
    #[error("client requested SRTP but we have no matching profiles")]
    ErrServerNoMatchingSrtpProfile,
    #[error("server responded with SRTP Profile we do not support")]
    ErrClientNoMatchingSrtpProfile,
    #[error("extended master secret is required but was not negotiated")]
    ErrExtendedMasterSecretRequired,
    #[error("unable to decrypt record")]
    ErrDecryptPacket,
    #[error("sequence number overflow")]
    ErrSequenceNumberOverflow,
    #[error("fragment buffer overflow")]
    ErrFragmentBufferOverflow,
    #[error("invalid DTLS role for this operation")]
    ErrInvalidDtlsRole,
    #[error("invalid cipher spec")]
    ErrInvalidCipherSpec,
    #[error("buffer not long enough to contain nonce")]
    ErrNotEnoughRoomForNonce,
    #[error("data length and declared length do not match")]
    ErrLengthMismatch,
    #[error("client requested zero or more elliptic curves that are not supported by the server")]
    ErrNoSupportedEllipticCurves,
    #[error("connection can not be created, no SignatureScheme satisfy this Config")]
    ErrNoAvailableSignatureSchemes,
    #[error("server requires the Extended Master Secret extension, but the client does not support it")]
    ErrServerRequiredButNoClientEms,
    #[error("client requested SRTP but no use_srtp extension was offered")]
    ErrRequestedButNoSrtpExtension,
    #[error("ApplicationData with epoch of 0")]
    ErrApplicationDataEpochZero,
    #[error("unhandled contentType")]
    ErrUnhandledContextType,
    #[error("key signature verification is not implemented for this key type")]
    ErrKeySignatureVerifyUnimplemented,
    #[error("handshake message was expected but not received")]
    ErrHandshakeMessageMissing,
    #[error("unsupported handshake message type")]
    ErrUnsupportedHandshakeType,

    //ExportKeyingMaterial errors
    #[error("tls handshake is in progress")]
    HandshakeInProgress,
    #[error("context is not supported for export_keying_material")]
    ContextUnsupported,
    #[error("export_keying_material can not be used with a reserved label")]
    ReservedExportKeyingMaterial,
    #[error("no cipher suite for export_keying_material")]
    CipherSuiteUnset,

    //SDP errors
    #[error("SdpInvalidSyntax: {0}")]
    SdpInvalidSyntax(String),
    #[error("SdpInvalidValue: {0}")]
    SdpInvalidValue(String),
    #[error("codec not found")]
    CodecNotFound,
    #[error("missing whitespace")]
    MissingWhitespace,
    #[error("missing colon")]
    MissingColon,
    #[error("payload type not found")]
    PayloadTypeNotFound,
    #[error("invalid parameter: {0}")]
    ErrInvalidParameter(String),

    //PeerConnection errors
    #[error("connection closed")]
    ErrConnectionClosed,
    #[error("x509Cert expired")]
    ErrCertificateExpired,
    #[error("no certificate")]
    ErrNonCertificate,
    #[error("operation can not be run in current signaling state")]
    ErrIncorrectSignalingState,
    #[error("can't rollback from stable state")]
    ErrSignalingStateCannotRollback,
    #[error("invalid proposed signaling state transition: {0}")]
    ErrSignalingStateProposedTransitionInvalid(String),
    #[error("set_local_description called with rejected duplicate ssrc: {0}")]
    ErrDuplicateLocalSsrc(u32),
    #[error("provided value is not a valid enum value of type SDPType")]
    ErrPeerConnSDPTypeInvalidValue,
    #[error("no remote description")]
    ErrNoRemoteDescription,
    #[error("DTLS transport does not run over ICE")]
    ErrIceTransportNotExists,
    #[error("set_remote_description called with no fingerprint")]
    ErrSessionDescriptionNoFingerprint,
    #[error("set_remote_description called with an invalid fingerprint")]
    ErrSessionDescriptionInvalidFingerprint,
    #[error("set_remote_description called with multiple conflicting fingerprint")]
    ErrSessionDescriptionConflictingFingerprints,
    #[error("set_remote_description called with no ice-ufrag")]
    ErrSessionDescriptionMissingIceUfrag,
    #[error("set_remote_description called with no ice-pwd")]
    ErrSessionDescriptionMissingIcePwd,
    #[error("DTLS Handshake completed and no SRTP Protection Profile was chosen")]
    ErrNoSRTPProtectionProfile,
    #[error("the DTLS transport has not started yet")]
    ErrDtlsTransportNotStarted,
    #[error("failed extracting keys from DTLS for SRTP")]
    ErrDtlsKeyExtractionFailed,
    #[error("attempted to start DTLSTransport that is not in new state")]
    ErrInvalidDTLSStart,
    #[error("peer didn't provide certificate via DTLS")]
    ErrNoRemoteCertificate,
    #[error("remote certificate does not match any fingerprint")]
    ErrNoMatchingCertificateFingerprint,
    #[error("unsupported fingerprint algorithm")]
    ErrUnsupportedFingerprintAlgorithm,
    #[error("set_answering_dtls_role must DTLSRoleClient or DTLSRoleServer")]
    ErrSettingEngineSetAnsweringDTLSRole,

    //Third Party Error
    #[error("{0}")]
    Rcgen(#[from] rcgen::Error),
    #[error("aes gcm: {0}")]
    AesGcm(#[from] aes_gcm::Error),
    #[error("parse ip: {0}")]
    ParseIp(#[from] net::AddrParseError),
    #[error("parse int: {0}")]
    ParseInt(#[from] ParseIntError),
    #[error("{0}")]
    Io(#[source] IoError),
    #[error("utf8: {0}")]
    Utf8(#[from] FromUtf8Error),

    #[error("Other DTLS Err: {0}")]
    OtherDtlsErr(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}

/// flatten_errs flattens multiple errors into one
pub fn flatten_errs(errs: Vec<impl Into<Error>>) -> Result<()> {
    if errs.is_empty() {
        Ok(())
    } else {
        let errs_strs: Vec<String> = errs.into_iter().map(|e| e.into().to_string()).collect();
        Err(Error::Other(errs_strs.join("\n")))
    }
}
