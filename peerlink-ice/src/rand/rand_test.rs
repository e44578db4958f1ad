use super::*;
use regex::Regex;
use shared::error::{Error, Result};

#[test]
fn test_random_generator_collision() -> Result<()> {
    let generators: Vec<(&str, fn() -> String)> = vec![
        ("CandidateID", generate_cand_id),
        ("PWD", generate_pwd),
        ("Ufrag", generate_ufrag),
    ];

    const N: usize = 10;
    const ITERATION: usize = 10;

    for (name, generate) in generators {
        for _ in 0..ITERATION {
            let rs: Vec<String> = (0..N).map(|_| generate()).collect();

            for i in 0..N {
                for j in i + 1..N {
                    assert_ne!(
                        rs[i], rs[j],
                        "{}: generateRandString caused collision: {} == {}",
                        name, rs[i], rs[j],
                    );
                }
            }
        }
    }

    Ok(())
}

#[test]
fn test_random_generator_alphabet() -> Result<()> {
    let cand_id = Regex::new(r"^candidate:[a-zA-Z0-9+/]{32}$")
        .map_err(|e| Error::Other(e.to_string()))?;
    let alpha = Regex::new(r"^[a-zA-Z]+$").map_err(|e| Error::Other(e.to_string()))?;

    assert!(cand_id.is_match(&generate_cand_id()));

    let ufrag = generate_ufrag();
    assert_eq!(ufrag.len(), LEN_UFRAG);
    assert!(alpha.is_match(&ufrag));

    let pwd = generate_pwd();
    assert_eq!(pwd.len(), LEN_PWD);
    assert!(alpha.is_match(&pwd));

    Ok(())
}
