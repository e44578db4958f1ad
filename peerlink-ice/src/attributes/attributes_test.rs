use super::control::*;
use super::priority::*;
use super::use_candidate::*;
use shared::error::*;
use stun::attributes::*;
use stun::message::*;

fn decoded(m: &Message) -> Result<Message> {
    let mut decoded = Message::new();
    decoded.unmarshal_binary(&m.marshal_binary()?)?;
    Ok(decoded)
}

#[test]
fn test_priority_get_from() -> Result<()> {
    let mut m = Message::new();
    let mut p = PriorityAttr::default();
    assert_eq!(p.get_from(&m), Err(Error::ErrAttributeNotFound));

    m.build(&[Box::new(BINDING_REQUEST), Box::new(PriorityAttr(112))])?;
    let m1 = decoded(&m)?;
    p.get_from(&m1)?;
    assert_eq!(p, PriorityAttr(112));

    let mut bad = Message::new();
    bad.add(ATTR_PRIORITY, &[1, 2, 3]);
    assert_eq!(
        PriorityAttr::default().get_from(&bad),
        Err(Error::ErrAttributeSizeInvalid)
    );

    Ok(())
}

#[test]
fn test_use_candidate_attr() -> Result<()> {
    let mut m = Message::new();
    assert!(!UseCandidateAttr::is_set(&m));
    m.build(&[Box::new(BINDING_REQUEST), Box::new(UseCandidateAttr::new())])?;
    assert!(UseCandidateAttr::is_set(&decoded(&m)?));

    Ok(())
}

#[test]
fn test_control_roles() -> Result<()> {
    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(AttrControl {
            role: IceRole::Controlling,
            tie_breaker: TieBreaker(4321),
        }),
    ])?;
    let m1 = decoded(&m)?;

    let mut c = AttrControl::default();
    c.get_from(&m1)?;
    assert_eq!(c.role, IceRole::Controlling);
    assert_eq!(c.tie_breaker, TieBreaker(4321));

    let mut controlling = AttrControlling::default();
    controlling.get_from(&m1)?;
    assert_eq!(controlling.0, 4321);
    assert_eq!(
        AttrControlled::default().get_from(&m1),
        Err(Error::ErrAttributeNotFound)
    );

    let mut m = Message::new();
    m.build(&[Box::new(BINDING_REQUEST), Box::new(AttrControlled(7))])?;
    let mut c = AttrControl::default();
    c.get_from(&decoded(&m)?)?;
    assert_eq!(c.role, IceRole::Controlled);
    assert_eq!(c.tie_breaker.0, 7);

    assert_eq!(
        AttrControl::default().get_from(&Message::new()),
        Err(Error::ErrAttributeNotFound)
    );

    Ok(())
}
