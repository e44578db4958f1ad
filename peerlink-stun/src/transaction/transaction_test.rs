use super::*;
use std::net::SocketAddr;

fn transport() -> Result<TransportContext> {
    let local: SocketAddr = "10.0.0.1:5000".parse()?;
    let server: SocketAddr = "192.0.2.1:3478".parse()?;
    Ok(TransportContext::udp(local, server))
}

#[test]
fn test_transaction_retransmit_schedule() -> Result<()> {
    let start = Instant::now();
    let mut tm: TransactionMap<usize> = TransactionMap::new(RtxPolicy::default());
    let tid = TransactionId::new();
    tm.start(start, tid, 7, b"binding", transport()?)?;
    assert!(tm.poll_transmit().is_some(), "initial request must be queued");

    let mut sends = vec![];
    while let Some(to) = tm.poll_timeout() {
        tm.handle_timeout(to);
        while tm.poll_transmit().is_some() {
            sends.push(to.duration_since(start).as_millis() as u64);
        }
    }

    assert_eq!(
        sends,
        vec![250, 750, 1750, 3750, 7750, 15750, 23750, 31750]
    );
    assert_eq!(
        tm.poll_event(),
        Some(TransactionEvent::Timeout(tid, 7)),
        "exhausted transaction must report its tag"
    );
    assert_eq!(tm.size(), 0);
    assert_eq!(
        RtxPolicy::default().total_timeout(),
        Duration::from_millis(39750)
    );

    Ok(())
}

#[test]
fn test_transaction_finish_stops_retransmits() -> Result<()> {
    let start = Instant::now();
    let mut tm: TransactionMap<()> = TransactionMap::new(RtxPolicy::default());
    let tid = TransactionId::new();
    tm.start(start, tid, (), b"binding", transport()?)?;
    assert_eq!(
        tm.start(start, tid, (), b"binding", transport()?),
        Err(Error::ErrTransactionExists)
    );

    assert!(tm.finish(&tid).is_some());
    assert!(tm.poll_timeout().is_none());
    tm.handle_timeout(start + Duration::from_secs(60));
    assert!(tm.poll_event().is_none());

    Ok(())
}

#[test]
fn test_transaction_cancel_if() -> Result<()> {
    let start = Instant::now();
    let mut tm: TransactionMap<u8> = TransactionMap::new(RtxPolicy::default());
    tm.start(start, TransactionId::new(), 1, b"a", transport()?)?;
    tm.start(start, TransactionId::new(), 2, b"b", transport()?)?;

    assert_eq!(tm.cancel_if(|tr| tr.tag == 1), 1);
    assert_eq!(tm.size(), 1);

    Ok(())
}
