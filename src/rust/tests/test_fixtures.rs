use std::collections::BTreeMap;

use crate::maps::Matrix;
use crate::ppi::Ppi;
use crate::protein::Protein;
use crate::value::Evidence;

pub const TEST_PROTEIN: &str = "PLANTANDANIMALGENQMES";

// Contains invalid character '1' which is not a valid amino acid
pub const TEST_PROTEIN_INVALID: &str = "PLANTANDANIMALGEN1MES";

/// SEP3 and AG MADS-box fragments
pub const SEP3_FRAGMENT: &str = "MGRGRVELKRIENKINRQVTFAKRRNGLLKKAYELSVLCDAEVALIIFSNRGKLYEFCSS";
pub const AG_FRAGMENT: &str = "GRGKIEIKRIENTTNRQVTFCKRRNGLLKKAYELSVLCDAEVALIVFSSRGRLYEYSNNS";

pub fn sep3() -> Protein {
    let mut protein = Protein::new(SEP3_FRAGMENT).unwrap();
    protein.bio_id = Some("SEP3".into());
    protein.uniprot_id = Some("O22456".into());
    protein.taxon_id = Some(3702);
    protein
}

pub fn ag() -> Protein {
    let mut protein = Protein::new(AG_FRAGMENT).unwrap();
    protein.bio_id = Some("AG".into());
    protein.uniprot_id = Some("P17839".into());
    protein.taxon_id = Some(3702);
    protein
}

/// SEP3=AG with one positive screen and a CA distance map
pub fn sep3_ag() -> Ppi {
    let mut ppi = Ppi::new(&sep3(), &ag());
    ppi.add_evidence("Gong_2017", vec![Evidence::Int(1)]);
    let mut maps = BTreeMap::new();
    maps.insert("CA".to_string(), Matrix::new(2, vec![0.0, 3.8, 3.8, 0.0]).unwrap());
    ppi.distance_map = Some(maps);
    ppi
}
