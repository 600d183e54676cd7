//! Taxonomy `efetch` XML (`TaxaSet/Taxon`) parsing.

use serde::{Deserialize, Serialize};

use crate::domain::TaxonomyId;
use crate::error::KiraError;

/// One rank of a lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub id: TaxonomyId,
    pub name: String,
    pub rank: String,
}

/// Returns the lineage of the first taxon in the document, ordered
/// root→leaf and ending with the taxon itself. An empty `TaxaSet` yields an
/// empty lineage.
pub fn parse_lineage_xml(xml: &str) -> Result<Vec<Classification>, KiraError> {
    let parsed: TaxaSetXml = quick_xml::de::from_str(xml)
        .map_err(|err| KiraError::MalformedResponse(format!("taxonomy XML: {err}")))?;
    let Some(TaxonXml {
        tax_id,
        scientific_name,
        rank,
        lineage: ancestors,
    }) = parsed.taxa.into_iter().next()
    else {
        return Ok(Vec::new());
    };

    let mut lineage = Vec::new();
    for ancestor in ancestors.map(|ancestors| ancestors.taxa).unwrap_or_default() {
        lineage.push(ancestor.into_classification()?);
    }
    lineage.push(classification(&tax_id, scientific_name, rank)?);
    Ok(lineage)
}

/// The rank directly above the leaf, if the lineage has one.
pub fn immediate_parent(lineage: &[Classification]) -> Option<&Classification> {
    if lineage.len() > 1 {
        lineage.get(lineage.len() - 2)
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename = "TaxaSet")]
struct TaxaSetXml {
    #[serde(rename = "Taxon", default)]
    taxa: Vec<TaxonXml>,
}

#[derive(Debug, Deserialize)]
struct TaxonXml {
    #[serde(rename = "TaxId")]
    tax_id: String,
    #[serde(rename = "ScientificName")]
    scientific_name: String,
    #[serde(rename = "Rank", default)]
    rank: Option<String>,
    #[serde(rename = "LineageEx", default)]
    lineage: Option<LineageXml>,
}

#[derive(Debug, Deserialize)]
struct LineageXml {
    #[serde(rename = "Taxon", default)]
    taxa: Vec<LineageTaxonXml>,
}

#[derive(Debug, Deserialize)]
struct LineageTaxonXml {
    #[serde(rename = "TaxId")]
    tax_id: String,
    #[serde(rename = "ScientificName")]
    scientific_name: String,
    #[serde(rename = "Rank", default)]
    rank: Option<String>,
}

impl LineageTaxonXml {
    fn into_classification(self) -> Result<Classification, KiraError> {
        classification(&self.tax_id, self.scientific_name, self.rank)
    }
}

fn classification(
    tax_id: &str,
    name: String,
    rank: Option<String>,
) -> Result<Classification, KiraError> {
    let id = tax_id
        .parse::<TaxonomyId>()
        .map_err(|_| KiraError::MalformedResponse(format!("taxonomy id {tax_id:?}")))?;
    Ok(Classification {
        id,
        name: name.trim().to_string(),
        rank: rank.unwrap_or_else(|| "no rank".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYTHIUM_XML: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE TaxaSet PUBLIC "-//NLM//DTD Taxon, 14th January 2002//EN" "https://www.ncbi.nlm.nih.gov/entrez/query/DTD/taxon.dtd">
<TaxaSet><Taxon>
    <TaxId>1213192</TaxId>
    <ScientificName>Pythium oopapillum</ScientificName>
    <ParentTaxId>4797</ParentTaxId>
    <Rank>species</Rank>
    <Division>Plants and Fungi</Division>
    <GeneticCode>
        <GCId>1</GCId>
        <GCName>Standard</GCName>
    </GeneticCode>
    <Lineage>cellular organisms; Eukaryota; Pythium</Lineage>
    <LineageEx>
        <Taxon>
            <TaxId>131567</TaxId>
            <ScientificName>cellular organisms</ScientificName>
            <Rank>no rank</Rank>
        </Taxon>
        <Taxon>
            <TaxId>2759</TaxId>
            <ScientificName>Eukaryota</ScientificName>
            <Rank>superkingdom</Rank>
        </Taxon>
        <Taxon>
            <TaxId>4797</TaxId>
            <ScientificName>Pythium</ScientificName>
            <Rank>genus</Rank>
        </Taxon>
    </LineageEx>
</Taxon>
</TaxaSet>"#;

    #[test]
    fn lineage_ends_with_taxon() {
        let lineage = parse_lineage_xml(PYTHIUM_XML).unwrap();
        assert_eq!(lineage.len(), 4);
        assert_eq!(lineage[0].name, "cellular organisms");
        assert_eq!(lineage[3].id, TaxonomyId::new(1213192));
        assert_eq!(lineage[3].rank, "species");

        let parent = immediate_parent(&lineage).unwrap();
        assert_eq!(parent.name, "Pythium");
        assert_eq!(parent.rank, "genus");
    }

    #[test]
    fn lineage_skips_unmodelled_elements() {
        let xml = r#"<TaxaSet><Taxon>
    <TaxId>9606</TaxId>
    <ScientificName>Homo sapiens</ScientificName>
    <OtherNames>
        <GenbankCommonName>human</GenbankCommonName>
        <Name><ClassCDE>authority</ClassCDE><DispName>Homo sapiens Linnaeus, 1758</DispName></Name>
    </OtherNames>
    <ParentTaxId>9605</ParentTaxId>
    <Rank>species</Rank>
    <LineageEx>
        <Taxon><TaxId>131567</TaxId><ScientificName>cellular organisms</ScientificName><Rank>no rank</Rank></Taxon>
        <Taxon><TaxId>9605</TaxId><ScientificName>Homo</ScientificName><Rank>genus</Rank></Taxon>
    </LineageEx>
    <Properties><Property><PropName>pgcode</PropName><PropValueInt>1</PropValueInt></Property></Properties>
    <CreateDate>1995/02/27 09:24:00</CreateDate>
</Taxon></TaxaSet>"#;
        let lineage = parse_lineage_xml(xml).unwrap();
        let names = lineage
            .iter()
            .map(|rank| rank.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["cellular organisms", "Homo", "Homo sapiens"]);
        assert_eq!(lineage[2].id, TaxonomyId::new(9606));
    }

    #[test]
    fn taxon_without_lineage_is_its_own_root() {
        let xml = "<TaxaSet><Taxon><TaxId>1</TaxId><ScientificName>root</ScientificName></Taxon></TaxaSet>";
        let lineage = parse_lineage_xml(xml).unwrap();
        assert_eq!(lineage.len(), 1);
        assert_eq!(lineage[0].rank, "no rank");
        assert!(immediate_parent(&lineage).is_none());
    }

    #[test]
    fn empty_taxa_set() {
        let lineage = parse_lineage_xml("<TaxaSet></TaxaSet>").unwrap();
        assert!(lineage.is_empty());
        assert!(immediate_parent(&lineage).is_none());
    }
}
